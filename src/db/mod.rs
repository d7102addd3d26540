//! SQLite database module for group state
//!
//! ## Tables
//!
//! - `groups` - Group attributes and the denormalised member count
//! - `group_members` - Membership ledger, one row per (group, member)
//! - `join_requests` - Pending requests against private groups
//! - `group_rules` - Rule book
//! - `group_posts`, `post_likes`, `post_comments`, `comment_replies` - Discussion threads
//! - `users` - Actor display attributes
//!
//! All access goes through one connection behind a mutex. Mutations run
//! inside [`GroupDb::with_tx`], so the authorization lookup and the writes
//! that depend on it commit together or not at all.

pub mod schema;
pub mod models;
pub mod groups;
pub mod members;
pub mod requests;
pub mod rules;
pub mod threads;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::error::SanghaError;

/// SQLite database for groups, ledgers and threads
pub struct GroupDb {
    conn: Mutex<Connection>,
}

impl GroupDb {
    /// Open or create the database under `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self, SanghaError> {
        let db_path = storage_dir.join("sangha.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, SanghaError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), SanghaError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SanghaError::Internal(format!("Lock poisoned: {}", e)))?;

        schema::init_schema(&conn)
    }

    /// Run a read against a consistent snapshot
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, SanghaError>
    where
        F: FnOnce(&Connection) -> Result<T, SanghaError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SanghaError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a check-then-mutate sequence as one transaction.
    ///
    /// The closure's error rolls the transaction back, leaving no partial
    /// effect behind.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, SanghaError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, SanghaError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SanghaError::Internal(format!("Lock poisoned: {}", e)))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, SanghaError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64, SanghaError> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                group_count: count("SELECT COUNT(*) FROM groups")?,
                membership_count: count("SELECT COUNT(*) FROM group_members")?,
                pending_request_count: count("SELECT COUNT(*) FROM join_requests")?,
                post_count: count("SELECT COUNT(*) FROM group_posts")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub group_count: u64,
    pub membership_count: u64,
    pub pending_request_count: u64,
    pub post_count: u64,
}

pub use models::{
    CommentRow, GroupCategory, GroupRow, JoinRequestRow, MemberRow, PostRow, Privacy, ReplyRow,
    Role, RuleRow, UserRow,
};
