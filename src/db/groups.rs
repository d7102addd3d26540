//! Group CRUD operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use tracing::debug;

use super::models::{parse_column, GroupCategory, GroupRow, Privacy};
use crate::error::SanghaError;

impl GroupRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            category: parse_column(row, "category")?,
            location: row.get("location")?,
            privacy: parse_column(row, "privacy")?,
            cover_image: row.get("cover_image")?,
            admin_id: row.get("admin_id")?,
            member_count: row.get("member_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Validated attributes for a new group
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: GroupCategory,
    pub location: Option<String>,
    pub privacy: Privacy,
    pub cover_image: Option<String>,
    pub admin_id: String,
    pub created_at: String,
}

/// Query parameters for group discovery - camelCase for URL params
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupQuery {
    /// Category name, or `All` for no filter
    #[serde(default, alias = "type")]
    pub category: Option<String>,
    /// Case-insensitive substring over name and description
    #[serde(default)]
    pub search: Option<String>,
}

const GROUP_COLUMNS: &str = "g.id, g.name, g.description, g.category, g.location, g.privacy, \
     g.cover_image, g.admin_id, g.member_count, g.created_at, g.updated_at";

/// Insert a group row. The founder's ledger entry is written separately.
pub fn insert_group(conn: &Connection, group: &NewGroup) -> Result<(), SanghaError> {
    conn.execute(
        "INSERT INTO groups (id, name, description, category, location, privacy, cover_image,
                             admin_id, member_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
        params![
            group.id,
            group.name,
            group.description,
            group.category.as_str(),
            group.location,
            group.privacy.as_str(),
            group.cover_image,
            group.admin_id,
            group.created_at,
        ],
    )?;
    Ok(())
}

/// Get group by ID
pub fn get_group(conn: &Connection, id: &str) -> Result<Option<GroupRow>, SanghaError> {
    let sql = format!("SELECT {} FROM groups g WHERE g.id = ?1", GROUP_COLUMNS);
    let group = conn
        .query_row(&sql, params![id], |row| GroupRow::from_row(row))
        .optional()?;
    Ok(group)
}

/// Get group by ID or fail with `GroupNotFound`
pub fn require_group(conn: &Connection, id: &str) -> Result<GroupRow, SanghaError> {
    get_group(conn, id)?.ok_or_else(|| SanghaError::GroupNotFound(id.to_string()))
}

/// Groups visible to `viewer_id`: public ones plus those the viewer belongs to
pub fn list_visible_groups(
    conn: &Connection,
    viewer_id: &str,
    category: Option<GroupCategory>,
    search: Option<&str>,
) -> Result<Vec<GroupRow>, SanghaError> {
    let mut sql = format!(
        "SELECT {} FROM groups g WHERE (g.privacy = 'public' OR EXISTS (
             SELECT 1 FROM group_members m WHERE m.group_id = g.id AND m.member_id = ?))",
        GROUP_COLUMNS
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(viewer_id.to_string())];

    if let Some(category) = category {
        sql.push_str(" AND g.category = ?");
        params.push(Box::new(category.as_str()));
    }

    if let Some(search) = search {
        sql.push_str(" AND (g.name LIKE ? ESCAPE '\\' OR g.description LIKE ? ESCAPE '\\')");
        let pattern = format!("%{}%", escape_like(search));
        params.push(Box::new(pattern.clone()));
        params.push(Box::new(pattern));
    }

    sql.push_str(" ORDER BY g.created_at DESC, g.rowid DESC");

    debug!("Executing query: {}", sql);

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| GroupRow::from_row(row))?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Shift the member counter by `delta`. Called inside the same transaction
/// as the ledger mutation it mirrors.
pub fn adjust_member_count(conn: &Connection, group_id: &str, delta: i64) -> Result<(), SanghaError> {
    conn.execute(
        "UPDATE groups SET member_count = member_count + ?1, updated_at = ?2 WHERE id = ?3",
        params![delta, super::models::current_timestamp(), group_id],
    )?;
    Ok(())
}

/// Delete a group; foreign keys cascade to every store it owns
pub fn delete_group(conn: &Connection, id: &str) -> Result<bool, SanghaError> {
    let deleted = conn.execute("DELETE FROM groups WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

/// Escape LIKE wildcards so user search text matches literally
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
