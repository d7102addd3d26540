//! Join request queue operations

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::JoinRequestRow;
use crate::error::SanghaError;

impl JoinRequestRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            group_id: row.get("group_id")?,
            requester_id: row.get("requester_id")?,
            requested_at: row.get("requested_at")?,
        })
    }
}

/// Insert a pending request. The (group, requester) unique key rejects duplicates.
pub fn insert_request(conn: &Connection, request: &JoinRequestRow) -> Result<(), SanghaError> {
    conn.execute(
        "INSERT INTO join_requests (id, group_id, requester_id, requested_at) VALUES (?1, ?2, ?3, ?4)",
        params![request.id, request.group_id, request.requester_id, request.requested_at],
    )?;
    Ok(())
}

/// Request by id, scoped to the group it must belong to
pub fn get_request(
    conn: &Connection,
    group_id: &str,
    request_id: &str,
) -> Result<Option<JoinRequestRow>, SanghaError> {
    let request = conn
        .query_row(
            "SELECT id, group_id, requester_id, requested_at FROM join_requests
             WHERE id = ?1 AND group_id = ?2",
            params![request_id, group_id],
            |row| JoinRequestRow::from_row(row),
        )
        .optional()?;
    Ok(request)
}

/// Pending request for (group, requester), if any
pub fn find_pending(
    conn: &Connection,
    group_id: &str,
    requester_id: &str,
) -> Result<Option<JoinRequestRow>, SanghaError> {
    let request = conn
        .query_row(
            "SELECT id, group_id, requester_id, requested_at FROM join_requests
             WHERE group_id = ?1 AND requester_id = ?2",
            params![group_id, requester_id],
            |row| JoinRequestRow::from_row(row),
        )
        .optional()?;
    Ok(request)
}

/// Pending requests for a group, oldest first
pub fn list_pending(conn: &Connection, group_id: &str) -> Result<Vec<JoinRequestRow>, SanghaError> {
    let mut stmt = conn.prepare(
        "SELECT id, group_id, requester_id, requested_at FROM join_requests
         WHERE group_id = ?1 ORDER BY requested_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![group_id], |row| JoinRequestRow::from_row(row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Discard a request. Returns false when it was not pending.
pub fn delete_request(conn: &Connection, group_id: &str, request_id: &str) -> Result<bool, SanghaError> {
    let deleted = conn.execute(
        "DELETE FROM join_requests WHERE id = ?1 AND group_id = ?2",
        params![request_id, group_id],
    )?;
    Ok(deleted > 0)
}
