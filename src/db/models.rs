//! Row types and enumerations shared by the repository modules
//!
//! Rows are snake_case and mirror the SQLite tables one-to-one. The
//! enumerations are stored as their lowercase (or, for categories,
//! capitalised) string form and parsed back on read.

use std::fmt;
use std::str::FromStr;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Current UTC timestamp in RFC 3339 with millisecond precision
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fresh opaque identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Enumerations
// ============================================================================

/// Role held by a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Moderator,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Member => "member",
        }
    }

    /// Roles that `set_role` may hand out. Admin is fixed at creation.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "member" => Ok(Role::Member),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Privacy {
    #[default]
    Public,
    Private,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Private => "private",
        }
    }
}

impl FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Privacy::Public),
            "private" => Ok(Privacy::Private),
            other => Err(other.to_string()),
        }
    }
}

/// Group category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GroupCategory {
    #[default]
    Community,
    Study,
    Temple,
    Meditation,
    Education,
}

impl GroupCategory {
    pub const ALL: [GroupCategory; 5] = [
        GroupCategory::Community,
        GroupCategory::Study,
        GroupCategory::Temple,
        GroupCategory::Meditation,
        GroupCategory::Education,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupCategory::Community => "Community",
            GroupCategory::Study => "Study",
            GroupCategory::Temple => "Temple",
            GroupCategory::Meditation => "Meditation",
            GroupCategory::Education => "Education",
        }
    }
}

impl FromStr for GroupCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Read an enum column, surfacing unknown values as a conversion failure
pub(crate) fn parse_column<T: FromStr<Err = String>>(
    row: &rusqlite::Row<'_>,
    column: &str,
) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|bad| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unexpected value '{}' in column {}", bad, column).into(),
        )
    })
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: GroupCategory,
    pub location: Option<String>,
    pub privacy: Privacy,
    pub cover_image: Option<String>,
    pub admin_id: String,
    pub member_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRow {
    pub group_id: String,
    pub member_id: String,
    pub role: Role,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinRequestRow {
    pub id: String,
    pub group_id: String,
    pub requester_id: String,
    pub requested_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleRow {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRow {
    pub id: String,
    pub group_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyRow {
    pub id: String,
    pub comment_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub profile_picture: Option<String>,
}
