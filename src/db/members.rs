//! Membership ledger operations

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::groups::escape_like;
use super::models::{parse_column, MemberRow, Role};
use crate::error::SanghaError;

impl MemberRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            group_id: row.get("group_id")?,
            member_id: row.get("member_id")?,
            role: parse_column(row, "role")?,
            joined_at: row.get("joined_at")?,
        })
    }
}

/// Ledger entry for (group, member), if any
pub fn get_member(
    conn: &Connection,
    group_id: &str,
    member_id: &str,
) -> Result<Option<MemberRow>, SanghaError> {
    let member = conn
        .query_row(
            "SELECT group_id, member_id, role, joined_at FROM group_members
             WHERE group_id = ?1 AND member_id = ?2",
            params![group_id, member_id],
            |row| MemberRow::from_row(row),
        )
        .optional()?;
    Ok(member)
}

/// Role held by `member_id` in the group, if any
pub fn get_role(conn: &Connection, group_id: &str, member_id: &str) -> Result<Option<Role>, SanghaError> {
    Ok(get_member(conn, group_id, member_id)?.map(|m| m.role))
}

/// Insert a ledger entry. The (group, member) primary key rejects duplicates.
pub fn insert_member(
    conn: &Connection,
    group_id: &str,
    member_id: &str,
    role: Role,
    joined_at: &str,
) -> Result<MemberRow, SanghaError> {
    conn.execute(
        "INSERT INTO group_members (group_id, member_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        params![group_id, member_id, role.as_str(), joined_at],
    )?;
    Ok(MemberRow {
        group_id: group_id.to_string(),
        member_id: member_id.to_string(),
        role,
        joined_at: joined_at.to_string(),
    })
}

/// Change the role of an existing non-admin entry. Returns false when no
/// such entry exists.
pub fn update_role(conn: &Connection, group_id: &str, member_id: &str, role: Role) -> Result<bool, SanghaError> {
    let updated = conn.execute(
        "UPDATE group_members SET role = ?1
         WHERE group_id = ?2 AND member_id = ?3 AND role != 'admin'",
        params![role.as_str(), group_id, member_id],
    )?;
    Ok(updated > 0)
}

/// Delete a non-admin entry. Returns false when no such entry exists.
pub fn delete_member(conn: &Connection, group_id: &str, member_id: &str) -> Result<bool, SanghaError> {
    let deleted = conn.execute(
        "DELETE FROM group_members WHERE group_id = ?1 AND member_id = ?2 AND role != 'admin'",
        params![group_id, member_id],
    )?;
    Ok(deleted > 0)
}

/// Ledger entries in join order, optionally filtered by username
pub fn list_members(
    conn: &Connection,
    group_id: &str,
    search: Option<&str>,
) -> Result<Vec<MemberRow>, SanghaError> {
    let mut sql = String::from(
        "SELECT m.group_id, m.member_id, m.role, m.joined_at FROM group_members m
         LEFT JOIN users u ON u.id = m.member_id
         WHERE m.group_id = ?",
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(group_id.to_string())];

    if let Some(search) = search {
        sql.push_str(" AND COALESCE(u.username, m.member_id) LIKE ? ESCAPE '\\'");
        params.push(Box::new(format!("%{}%", escape_like(search))));
    }

    sql.push_str(" ORDER BY m.joined_at ASC, m.rowid ASC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| MemberRow::from_row(row))?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Number of ledger entries for the group
pub fn count_members(conn: &Connection, group_id: &str) -> Result<i64, SanghaError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM group_members WHERE group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Number of admin entries for the group
pub fn count_admins(conn: &Connection, group_id: &str) -> Result<i64, SanghaError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM group_members WHERE group_id = ?1 AND role = 'admin'",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
