//! Actor display attributes

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::models::UserRow;
use crate::error::SanghaError;

/// Record the actor's current display attributes. A missing avatar keeps
/// whatever was stored before.
pub fn upsert_user(
    conn: &Connection,
    id: &str,
    username: &str,
    profile_picture: Option<&str>,
    seen_at: &str,
) -> Result<(), SanghaError> {
    conn.execute(
        "INSERT INTO users (id, username, profile_picture, first_seen_at, last_seen_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(id) DO UPDATE SET
             username = excluded.username,
             profile_picture = COALESCE(excluded.profile_picture, users.profile_picture),
             last_seen_at = excluded.last_seen_at",
        params![id, username, profile_picture, seen_at],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>, SanghaError> {
    let user = conn
        .query_row(
            "SELECT id, username, profile_picture FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    profile_picture: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Resolves author ids to display attributes, hitting the table once per id
pub struct UserDirectory<'c> {
    conn: &'c Connection,
    cache: HashMap<String, UserRow>,
}

impl<'c> UserDirectory<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            cache: HashMap::new(),
        }
    }

    /// Display attributes for `id`. Actors never seen fall back to their id.
    pub fn resolve(&mut self, id: &str) -> Result<UserRow, SanghaError> {
        if let Some(user) = self.cache.get(id) {
            return Ok(user.clone());
        }

        let user = get_user(self.conn, id)?.unwrap_or_else(|| UserRow {
            id: id.to_string(),
            username: id.to_string(),
            profile_picture: None,
        });
        self.cache.insert(id.to_string(), user.clone());
        Ok(user)
    }
}
