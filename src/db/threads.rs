//! Discussion thread operations: posts, like sets, comments, replies
//!
//! Comments and replies are flat tables keyed by their parent id, so an
//! append touches one row and never rewrites the parent post.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{CommentRow, PostRow, ReplyRow};
use crate::error::SanghaError;

impl PostRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            group_id: row.get("group_id")?,
            author_id: row.get("author_id")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl CommentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            author_id: row.get("author_id")?,
            text: row.get("text")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl ReplyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            comment_id: row.get("comment_id")?,
            author_id: row.get("author_id")?,
            text: row.get("text")?,
            created_at: row.get("created_at")?,
        })
    }
}

// ============================================================================
// Posts
// ============================================================================

pub fn insert_post(conn: &Connection, post: &PostRow) -> Result<(), SanghaError> {
    conn.execute(
        "INSERT INTO group_posts (id, group_id, author_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post.id, post.group_id, post.author_id, post.content, post.created_at],
    )?;
    Ok(())
}

pub fn get_post(conn: &Connection, post_id: &str) -> Result<Option<PostRow>, SanghaError> {
    let post = conn
        .query_row(
            "SELECT id, group_id, author_id, content, created_at FROM group_posts WHERE id = ?1",
            params![post_id],
            |row| PostRow::from_row(row),
        )
        .optional()?;
    Ok(post)
}

pub fn require_post(conn: &Connection, post_id: &str) -> Result<PostRow, SanghaError> {
    get_post(conn, post_id)?.ok_or_else(|| SanghaError::PostNotFound(post_id.to_string()))
}

pub fn count_posts(conn: &Connection, group_id: &str) -> Result<i64, SanghaError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM group_posts WHERE group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// One page of posts, newest first. Posts created in the same millisecond
/// fall back to insertion order.
pub fn list_posts(
    conn: &Connection,
    group_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostRow>, SanghaError> {
    let mut stmt = conn.prepare(
        "SELECT id, group_id, author_id, content, created_at FROM group_posts
         WHERE group_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt.query_map(params![group_id, limit, offset], |row| PostRow::from_row(row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ============================================================================
// Like sets
// ============================================================================

/// Flip the actor's presence in the like set. Returns true when the actor
/// is now in the set.
pub fn toggle_like(conn: &Connection, post_id: &str, actor_id: &str, at: &str) -> Result<bool, SanghaError> {
    let removed = conn.execute(
        "DELETE FROM post_likes WHERE post_id = ?1 AND actor_id = ?2",
        params![post_id, actor_id],
    )?;
    if removed > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO post_likes (post_id, actor_id, liked_at) VALUES (?1, ?2, ?3)",
        params![post_id, actor_id, at],
    )?;
    Ok(true)
}

pub fn like_count(conn: &Connection, post_id: &str) -> Result<i64, SanghaError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Actors in the like set, in the order they liked
pub fn list_likers(conn: &Connection, post_id: &str) -> Result<Vec<String>, SanghaError> {
    let mut stmt =
        conn.prepare("SELECT actor_id FROM post_likes WHERE post_id = ?1 ORDER BY rowid ASC")?;
    let rows = stmt.query_map(params![post_id], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<String>, _>>()?)
}

// ============================================================================
// Comments and replies
// ============================================================================

pub fn insert_comment(conn: &Connection, comment: &CommentRow) -> Result<(), SanghaError> {
    conn.execute(
        "INSERT INTO post_comments (id, post_id, author_id, text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![comment.id, comment.post_id, comment.author_id, comment.text, comment.created_at],
    )?;
    Ok(())
}

/// Comment by id, scoped to the post it must belong to
pub fn get_comment(
    conn: &Connection,
    post_id: &str,
    comment_id: &str,
) -> Result<Option<CommentRow>, SanghaError> {
    let comment = conn
        .query_row(
            "SELECT id, post_id, author_id, text, created_at FROM post_comments
             WHERE id = ?1 AND post_id = ?2",
            params![comment_id, post_id],
            |row| CommentRow::from_row(row),
        )
        .optional()?;
    Ok(comment)
}

/// Comments in strict insertion order
pub fn list_comments(conn: &Connection, post_id: &str) -> Result<Vec<CommentRow>, SanghaError> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, author_id, text, created_at FROM post_comments
         WHERE post_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![post_id], |row| CommentRow::from_row(row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn insert_reply(conn: &Connection, reply: &ReplyRow) -> Result<(), SanghaError> {
    conn.execute(
        "INSERT INTO comment_replies (id, comment_id, author_id, text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![reply.id, reply.comment_id, reply.author_id, reply.text, reply.created_at],
    )?;
    Ok(())
}

/// Replies in strict insertion order
pub fn list_replies(conn: &Connection, comment_id: &str) -> Result<Vec<ReplyRow>, SanghaError> {
    let mut stmt = conn.prepare(
        "SELECT id, comment_id, author_id, text, created_at FROM comment_replies
         WHERE comment_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![comment_id], |row| ReplyRow::from_row(row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
