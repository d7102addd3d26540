//! Service layer for sangha
//!
//! Services sit between the HTTP handlers and the repositories. Each
//! mutating call follows the same shape:
//!
//! ```text
//! validate input (no store touched)
//!     ↓
//! GroupDb::with_tx {
//!     look up group + actor role
//!     Authorization Gate
//!     repository writes (+ member count)
//! }
//!     ↓
//! emit GroupEvent (after commit)
//! ```

pub mod response;
pub mod events;
pub mod group_service;
pub mod request_service;
pub mod rule_service;
pub mod thread_service;

pub use response::*;
pub use events::{EventBus, EventListener, GroupEvent};
pub use group_service::{CreateGroupInput, GroupService, RoleInput};
pub use request_service::RequestService;
pub use rule_service::{RuleInput, RuleService};
pub use thread_service::{PageQuery, PostInput, TextInput, ThreadService};

use std::sync::Arc;

use rusqlite::Connection;
use tracing::warn;

use crate::authz::{AccessPolicy, Action};
use crate::config::Config;
use crate::db::{groups, members, models::current_timestamp, users, GroupDb, GroupRow, Role};
use crate::error::SanghaError;
use crate::identity::Actor;

/// Service container for dependency injection
///
/// Holds all services over one shared database and event bus.
pub struct Services {
    pub db: Arc<GroupDb>,
    pub groups: Arc<GroupService>,
    pub requests: Arc<RequestService>,
    pub rules: Arc<RuleService>,
    pub threads: Arc<ThreadService>,
    pub events: Arc<EventBus>,
}

impl Services {
    pub fn new(db: Arc<GroupDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());
        let policy = Arc::new(config.access_policy());

        Self {
            groups: Arc::new(GroupService::new(
                db.clone(),
                events.clone(),
                policy.clone(),
                config.lenient_privacy,
            )),
            requests: Arc::new(RequestService::new(db.clone(), events.clone(), policy.clone())),
            rules: Arc::new(RuleService::new(db.clone(), events.clone(), policy.clone())),
            threads: Arc::new(ThreadService::new(
                db.clone(),
                events.clone(),
                policy,
                config.default_page_size,
                config.max_page_size,
            )),
            events,
            db,
        }
    }

    /// Services with default configuration (for testing)
    pub fn with_defaults(db: Arc<GroupDb>) -> Self {
        Self::new(db, &Config::default())
    }

    /// Record the caller's display attributes so listings can show them
    pub fn register_actor(&self, actor: &Actor) -> Result<(), SanghaError> {
        self.db.with_tx(|tx| {
            users::upsert_user(
                tx,
                &actor.id,
                &actor.display_name,
                actor.avatar.as_deref(),
                &current_timestamp(),
            )
        })
    }
}

/// Load the group, look up the actor's role and run the gate, all against
/// the caller's transaction.
pub(crate) fn authorize_in_group(
    conn: &Connection,
    policy: &AccessPolicy,
    group_id: &str,
    actor_id: &str,
    action: Action,
) -> Result<(GroupRow, Option<Role>), SanghaError> {
    let group = groups::require_group(conn, group_id)?;
    let role = members::get_role(conn, group_id, actor_id)?;

    if let Err(e) = policy.authorize(action, role) {
        warn!(group = %group_id, actor = %actor_id, action = ?action, "Denied");
        return Err(e);
    }

    Ok((group, role))
}

/// Trimmed value of a required text field
pub(crate) fn required_text(value: Option<&str>, field: &str) -> Result<String, SanghaError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(SanghaError::InvalidInput(format!("{} is required", field))),
    }
}

/// Trimmed optional text, with blank treated as absent
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
