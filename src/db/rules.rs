//! Rule book operations

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::RuleRow;
use crate::error::SanghaError;

impl RuleRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            group_id: row.get("group_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

const RULE_COLUMNS: &str = "id, group_id, title, description, created_by, created_at, updated_at";

pub fn insert_rule(conn: &Connection, rule: &RuleRow) -> Result<(), SanghaError> {
    conn.execute(
        "INSERT INTO group_rules (id, group_id, title, description, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            rule.id,
            rule.group_id,
            rule.title,
            rule.description,
            rule.created_by,
            rule.created_at,
            rule.updated_at,
        ],
    )?;
    Ok(())
}

/// Rule by id, scoped to its owning group
pub fn get_rule(conn: &Connection, group_id: &str, rule_id: &str) -> Result<Option<RuleRow>, SanghaError> {
    let sql = format!(
        "SELECT {} FROM group_rules WHERE id = ?1 AND group_id = ?2",
        RULE_COLUMNS
    );
    let rule = conn
        .query_row(&sql, params![rule_id, group_id], |row| RuleRow::from_row(row))
        .optional()?;
    Ok(rule)
}

/// Rules in the order they were authored
pub fn list_rules(conn: &Connection, group_id: &str) -> Result<Vec<RuleRow>, SanghaError> {
    let sql = format!(
        "SELECT {} FROM group_rules WHERE group_id = ?1 ORDER BY rowid ASC",
        RULE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![group_id], |row| RuleRow::from_row(row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Overwrite title and description. Returns false when the rule is not in the group.
pub fn update_rule(
    conn: &Connection,
    group_id: &str,
    rule_id: &str,
    title: &str,
    description: Option<&str>,
    updated_at: &str,
) -> Result<bool, SanghaError> {
    let updated = conn.execute(
        "UPDATE group_rules SET title = ?1, description = ?2, updated_at = ?3
         WHERE id = ?4 AND group_id = ?5",
        params![title, description, updated_at, rule_id, group_id],
    )?;
    Ok(updated > 0)
}

pub fn delete_rule(conn: &Connection, group_id: &str, rule_id: &str) -> Result<bool, SanghaError> {
    let deleted = conn.execute(
        "DELETE FROM group_rules WHERE id = ?1 AND group_id = ?2",
        params![rule_id, group_id],
    )?;
    Ok(deleted > 0)
}
