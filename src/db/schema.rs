//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::SanghaError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), SanghaError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, SanghaError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SanghaError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), SanghaError> {
    conn.execute_batch(USERS_SCHEMA)?;
    conn.execute_batch(GROUPS_SCHEMA)?;
    conn.execute_batch(THREADS_SCHEMA)?;
    conn.execute_batch(INDEXES_SCHEMA)?;
    Ok(())
}

/// Actor display attributes, refreshed from the identity on every request
const USERS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL,
    profile_picture TEXT,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);
"#;

/// Groups and the three stores they own by composition
const GROUPS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'Community',
    location TEXT,
    privacy TEXT NOT NULL DEFAULT 'public' CHECK (privacy IN ('public', 'private')),
    cover_image TEXT,
    admin_id TEXT NOT NULL,
    member_count INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Membership ledger: one entry per (group, member)
CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL,
    member_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('admin', 'moderator', 'member')),
    joined_at TEXT NOT NULL,
    PRIMARY KEY (group_id, member_id),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

-- Pending join requests: at most one per (group, requester)
CREATE TABLE IF NOT EXISTS join_requests (
    id TEXT PRIMARY KEY NOT NULL,
    group_id TEXT NOT NULL,
    requester_id TEXT NOT NULL,
    requested_at TEXT NOT NULL,
    UNIQUE (group_id, requester_id),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

-- Rule book, ordered by insertion (rowid)
CREATE TABLE IF NOT EXISTS group_rules (
    id TEXT PRIMARY KEY NOT NULL,
    group_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);
"#;

/// Discussion threads: posts, like sets, comments, replies
const THREADS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS group_posts (
    id TEXT PRIMARY KEY NOT NULL,
    group_id TEXT NOT NULL,
    author_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS post_likes (
    post_id TEXT NOT NULL,
    actor_id TEXT NOT NULL,
    liked_at TEXT NOT NULL,
    PRIMARY KEY (post_id, actor_id),
    FOREIGN KEY (post_id) REFERENCES group_posts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS post_comments (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT NOT NULL,
    author_id TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (post_id) REFERENCES group_posts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS comment_replies (
    id TEXT PRIMARY KEY NOT NULL,
    comment_id TEXT NOT NULL,
    author_id TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (comment_id) REFERENCES post_comments(id) ON DELETE CASCADE
);
"#;

const INDEXES_SCHEMA: &str = r#"
-- Admin singularity: at most one admin entry per group
CREATE UNIQUE INDEX IF NOT EXISTS idx_group_members_single_admin
    ON group_members(group_id) WHERE role = 'admin';
CREATE INDEX IF NOT EXISTS idx_group_members_member ON group_members(member_id);
CREATE INDEX IF NOT EXISTS idx_group_rules_group ON group_rules(group_id);
CREATE INDEX IF NOT EXISTS idx_group_posts_group ON group_posts(group_id, created_at);
CREATE INDEX IF NOT EXISTS idx_post_comments_post ON post_comments(post_id);
CREATE INDEX IF NOT EXISTS idx_comment_replies_comment ON comment_replies(comment_id);
CREATE INDEX IF NOT EXISTS idx_groups_created ON groups(created_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_version_read_error_is_not_treated_as_fresh() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER NOT NULL);
             INSERT INTO schema_version VALUES ('not a number');",
        )
        .unwrap();

        assert!(get_schema_version(&conn).is_err());
        assert!(init_schema(&conn).is_err());
        let groups_table: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'groups'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(groups_table, 0);
    }

    #[test]
    fn test_empty_version_table_reads_as_fresh() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_second_admin_rejected_by_index() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO groups (id, name, description, admin_id, created_at, updated_at)
                 VALUES ('g', 'n', 'd', 'a', 't', 't');
             INSERT INTO group_members VALUES ('g', 'a', 'admin', 't');",
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO group_members VALUES ('g', 'b', 'admin', 't')",
            [],
        );
        assert!(second.is_err());
    }
}
