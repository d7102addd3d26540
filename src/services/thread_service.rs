//! Discussion thread service - posts, like sets, comments and replies
//!
//! Posts are group scoped and gated on membership. Likes, comments and
//! replies go through the configurable gate levels in [`AccessPolicy`].

use std::sync::Arc;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::debug;

use crate::authz::{AccessPolicy, Action};
use crate::db::models::{current_timestamp, new_id};
use crate::db::users::UserDirectory;
use crate::db::{groups, threads, CommentRow, GroupDb, PostRow, ReplyRow};
use crate::error::SanghaError;
use crate::views::{CommentView, LikeToggleView, PostPageView, PostView, ReplyView};

use super::events::{EventBus, GroupEvent};
use super::{authorize_in_group, required_text};

/// Body of a create-post call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub content: Option<String>,
}

/// Body of comment and reply calls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextInput {
    pub text: Option<String>,
}

/// Pagination parameters - camelCase for URL params
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, alias = "limit")]
    pub page_size: Option<u32>,
}

pub struct ThreadService {
    db: Arc<GroupDb>,
    events: Arc<EventBus>,
    policy: Arc<AccessPolicy>,
    default_page_size: u32,
    max_page_size: u32,
}

impl ThreadService {
    pub fn new(
        db: Arc<GroupDb>,
        events: Arc<EventBus>,
        policy: Arc<AccessPolicy>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Self {
        Self {
            db,
            events,
            policy,
            default_page_size,
            max_page_size,
        }
    }

    // =========================================================================
    // Posts
    // =========================================================================

    pub fn create_post(&self, group_id: &str, actor_id: &str, input: PostInput) -> Result<PostView, SanghaError> {
        let content = required_text(input.content.as_deref(), "content")?;

        let view = self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, actor_id, Action::Post)?;

            let row = PostRow {
                id: new_id(),
                group_id: group_id.to_string(),
                author_id: actor_id.to_string(),
                content,
                created_at: current_timestamp(),
            };
            threads::insert_post(tx, &row)?;
            let author = UserDirectory::new(tx).resolve(actor_id)?;
            Ok(PostView::new(row, author.into(), Vec::new(), Vec::new()))
        })?;

        self.events.emit(GroupEvent::PostCreated {
            group_id: group_id.to_string(),
            post_id: view.id.clone(),
            author_id: actor_id.to_string(),
        });
        Ok(view)
    }

    /// One page of posts, newest first, with authors and threads resolved
    pub fn list_posts(&self, group_id: &str, query: &PageQuery) -> Result<PostPageView, SanghaError> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(SanghaError::InvalidInput("page must be at least 1".into()));
        }
        let page_size = query.page_size.unwrap_or(self.default_page_size);
        if page_size == 0 {
            return Err(SanghaError::InvalidInput("pageSize must be at least 1".into()));
        }
        let page_size = page_size.min(self.max_page_size);

        self.db.with_conn(|conn| {
            groups::require_group(conn, group_id)?;
            let total = threads::count_posts(conn, group_id)?;
            let offset = i64::from(page - 1) * i64::from(page_size);
            let rows = threads::list_posts(conn, group_id, i64::from(page_size), offset)?;

            let mut directory = UserDirectory::new(conn);
            let posts = rows
                .into_iter()
                .map(|row| expand_post(conn, &mut directory, row))
                .collect::<Result<Vec<_>, _>>()?;

            debug!(group = %group_id, page, page_size, total, "Listed posts");
            Ok(PostPageView::new(posts, total, page, page_size))
        })
    }

    // =========================================================================
    // Like sets
    // =========================================================================

    /// Flip the actor in or out of the post's like set
    pub fn toggle_like(&self, post_id: &str, actor_id: &str) -> Result<LikeToggleView, SanghaError> {
        let view = self.db.with_tx(|tx| {
            let post = threads::require_post(tx, post_id)?;
            authorize_in_group(tx, &self.policy, &post.group_id, actor_id, Action::Like)?;

            let liked = threads::toggle_like(tx, post_id, actor_id, &current_timestamp())?;
            let count = threads::like_count(tx, post_id)?;
            Ok(LikeToggleView::new(liked, count))
        })?;

        let (post_id, actor_id) = (post_id.to_string(), actor_id.to_string());
        self.events.emit(if view.liked {
            GroupEvent::PostLiked { post_id, actor_id }
        } else {
            GroupEvent::PostUnliked { post_id, actor_id }
        });
        Ok(view)
    }

    // =========================================================================
    // Comments and replies
    // =========================================================================

    pub fn add_comment(&self, post_id: &str, actor_id: &str, input: TextInput) -> Result<CommentView, SanghaError> {
        let text = required_text(input.text.as_deref(), "text")?;

        let view = self.db.with_tx(|tx| {
            let post = threads::require_post(tx, post_id)?;
            authorize_in_group(tx, &self.policy, &post.group_id, actor_id, Action::Comment)?;

            let row = CommentRow {
                id: new_id(),
                post_id: post_id.to_string(),
                author_id: actor_id.to_string(),
                text,
                created_at: current_timestamp(),
            };
            threads::insert_comment(tx, &row)?;
            let author = UserDirectory::new(tx).resolve(actor_id)?;
            Ok(CommentView::new(row, author.into(), Vec::new()))
        })?;

        self.events.emit(GroupEvent::CommentAdded {
            post_id: post_id.to_string(),
            comment_id: view.id.clone(),
            author_id: actor_id.to_string(),
        });
        Ok(view)
    }

    /// Append a reply to a comment that must belong to `post_id`
    pub fn add_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        actor_id: &str,
        input: TextInput,
    ) -> Result<ReplyView, SanghaError> {
        let text = required_text(input.text.as_deref(), "text")?;

        let view = self.db.with_tx(|tx| {
            let post = threads::require_post(tx, post_id)?;
            authorize_in_group(tx, &self.policy, &post.group_id, actor_id, Action::Reply)?;
            if threads::get_comment(tx, post_id, comment_id)?.is_none() {
                return Err(SanghaError::CommentNotFound(comment_id.to_string()));
            }

            let row = ReplyRow {
                id: new_id(),
                comment_id: comment_id.to_string(),
                author_id: actor_id.to_string(),
                text,
                created_at: current_timestamp(),
            };
            threads::insert_reply(tx, &row)?;
            let author = UserDirectory::new(tx).resolve(actor_id)?;
            Ok(ReplyView::new(row, author.into()))
        })?;

        self.events.emit(GroupEvent::ReplyAdded {
            post_id: post_id.to_string(),
            comment_id: comment_id.to_string(),
            reply_id: view.id.clone(),
            author_id: actor_id.to_string(),
        });
        Ok(view)
    }
}

/// Resolve a post's author, like set and nested comment thread
fn expand_post(
    conn: &Connection,
    directory: &mut UserDirectory<'_>,
    row: PostRow,
) -> Result<PostView, SanghaError> {
    let author = directory.resolve(&row.author_id)?;
    let likes = threads::list_likers(conn, &row.id)?;

    let mut comments = Vec::new();
    for comment in threads::list_comments(conn, &row.id)? {
        let comment_author = directory.resolve(&comment.author_id)?;
        let mut replies = Vec::new();
        for reply in threads::list_replies(conn, &comment.id)? {
            let reply_author = directory.resolve(&reply.author_id)?;
            replies.push(ReplyView::new(reply, reply_author.into()));
        }
        comments.push(CommentView::new(comment, comment_author.into(), replies));
    }

    Ok(PostView::new(row, author.into(), likes, comments))
}
