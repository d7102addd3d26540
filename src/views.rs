//! View types for the HTTP API boundary
//!
//! These types use camelCase serialization for the mobile client.
//! Row types in `db::models` stay snake_case to match the tables.
//!
//! Author references are always resolved to an [`AuthorView`] so a client
//! can render a thread without a second round trip.

use serde::Serialize;
use ts_rs::TS;

use crate::db::{
    CommentRow, GroupCategory, GroupRow, JoinRequestRow, MemberRow, PostRow, Privacy, ReplyRow,
    Role, RuleRow, UserRow,
};

fn count(n: i64) -> u32 {
    u32::try_from(n.max(0)).unwrap_or(u32::MAX)
}

// ============================================================================
// Authors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthorView {
    pub id: String,
    pub username: String,
    pub profile_picture: Option<String>,
}

impl From<UserRow> for AuthorView {
    fn from(u: UserRow) -> Self {
        Self {
            id: u.id,
            username: u.username,
            profile_picture: u.profile_picture,
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GroupView {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub category: GroupCategory,
    pub location: Option<String>,
    pub privacy: Privacy,
    pub cover_image: Option<String>,
    pub admin_id: String,
    pub member_count: u32,
    pub created_at: String,
}

impl From<GroupRow> for GroupView {
    fn from(g: GroupRow) -> Self {
        Self {
            id: g.id,
            name: g.name,
            description: g.description,
            category: g.category,
            location: g.location,
            privacy: g.privacy,
            cover_image: g.cover_image,
            admin_id: g.admin_id,
            member_count: count(g.member_count),
            created_at: g.created_at,
        }
    }
}

/// Group as seen by one actor
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GroupDetailView {
    #[serde(flatten)]
    pub group: GroupView,
    pub admin: AuthorView,
    /// The viewing actor's role, absent for non-members
    pub viewer_role: Option<Role>,
    pub has_pending_request: bool,
}

// ============================================================================
// Membership ledger
// ============================================================================

/// A ledger entry as returned by join/accept
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LedgerEntryView {
    pub group_id: String,
    pub member_id: String,
    pub role: Role,
    pub joined_at: String,
}

impl From<MemberRow> for LedgerEntryView {
    fn from(m: MemberRow) -> Self {
        Self {
            group_id: m.group_id,
            member_id: m.member_id,
            role: m.role,
            joined_at: m.joined_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MemberView {
    pub user: AuthorView,
    pub role: Role,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MemberListView {
    pub admin: AuthorView,
    pub members: Vec<MemberView>,
}

// ============================================================================
// Join requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JoinRequestView {
    pub id: String,
    pub group_id: String,
    pub user: AuthorView,
    pub requested_at: String,
}

impl JoinRequestView {
    pub fn new(row: JoinRequestRow, user: AuthorView) -> Self {
        Self {
            id: row.id,
            group_id: row.group_id,
            user,
            requested_at: row.requested_at,
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleView {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: AuthorView,
    pub created_at: String,
    pub updated_at: String,
}

impl RuleView {
    pub fn new(row: RuleRow, created_by: AuthorView) -> Self {
        Self {
            id: row.id,
            group_id: row.group_id,
            title: row.title,
            description: row.description,
            created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================================================
// Threads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReplyView {
    pub id: String,
    pub author: AuthorView,
    pub text: String,
    pub created_at: String,
}

impl ReplyView {
    pub fn new(row: ReplyRow, author: AuthorView) -> Self {
        Self {
            id: row.id,
            author,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentView {
    pub id: String,
    pub author: AuthorView,
    pub text: String,
    pub created_at: String,
    pub replies: Vec<ReplyView>,
}

impl CommentView {
    pub fn new(row: CommentRow, author: AuthorView, replies: Vec<ReplyView>) -> Self {
        Self {
            id: row.id,
            author,
            text: row.text,
            created_at: row.created_at,
            replies,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostView {
    pub id: String,
    pub group_id: String,
    pub author: AuthorView,
    pub content: String,
    /// Actor ids in the like set
    pub likes: Vec<String>,
    pub likes_count: u32,
    pub comments: Vec<CommentView>,
    pub created_at: String,
}

impl PostView {
    pub fn new(row: PostRow, author: AuthorView, likes: Vec<String>, comments: Vec<CommentView>) -> Self {
        let likes_count = u32::try_from(likes.len()).unwrap_or(u32::MAX);
        Self {
            id: row.id,
            group_id: row.group_id,
            author,
            content: row.content,
            likes,
            likes_count,
            comments,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostPageView {
    pub posts: Vec<PostView>,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
    pub total_posts: u32,
}

impl PostPageView {
    pub fn new(posts: Vec<PostView>, total_posts: i64, current_page: u32, page_size: u32) -> Self {
        let total = count(total_posts);
        Self {
            posts,
            total_pages: total.div_ceil(page_size.max(1)),
            current_page,
            page_size,
            total_posts: total,
        }
    }
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LikeToggleView {
    pub liked: bool,
    pub likes_count: u32,
}

impl LikeToggleView {
    pub fn new(liked: bool, likes_count: i64) -> Self {
        Self {
            liked,
            likes_count: count(likes_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(PostPageView::new(vec![], 0, 1, 10).total_pages, 0);
        assert_eq!(PostPageView::new(vec![], 10, 1, 10).total_pages, 1);
        assert_eq!(PostPageView::new(vec![], 11, 1, 10).total_pages, 2);
    }

    #[test]
    fn test_group_view_serializes_type_and_camel_case() {
        let view = GroupView {
            id: "g1".into(),
            name: "Vedanta study".into(),
            description: "Upanishad readings".into(),
            category: GroupCategory::Study,
            location: Some("Pune".into()),
            privacy: Privacy::Private,
            cover_image: None,
            admin_id: "a".into(),
            member_count: 3,
            created_at: "t".into(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "Study");
        assert_eq!(json["privacy"], "private");
        assert_eq!(json["memberCount"], 3);
        assert!(json.get("coverImage").is_some());
    }
}
