//! Group service - group lifecycle and the membership ledger
//!
//! Every ledger mutation runs its gate check, the ledger write and the
//! member count update in one transaction, so `member_count` always equals
//! the number of ledger entries and exactly one entry holds `admin`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::authz::{AccessPolicy, Action};
use crate::db::groups::{self, GroupQuery, NewGroup};
use crate::db::models::{current_timestamp, new_id};
use crate::db::users::UserDirectory;
use crate::db::{members, requests, GroupCategory, GroupDb, Privacy, Role};
use crate::error::SanghaError;
use crate::views::{AuthorView, GroupDetailView, GroupView, LedgerEntryView, MemberListView, MemberView};

use super::events::{EventBus, GroupEvent};
use super::{authorize_in_group, optional_text, required_text};

/// Body of a create-group call - camelCase for the mobile client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, alias = "type")]
    pub category: Option<String>,
    pub location: Option<String>,
    pub privacy: Option<String>,
    pub cover_image: Option<String>,
}

/// Body of a set-role call
#[derive(Debug, Clone, Deserialize)]
pub struct RoleInput {
    pub role: Option<String>,
}

pub struct GroupService {
    db: Arc<GroupDb>,
    events: Arc<EventBus>,
    policy: Arc<AccessPolicy>,
    lenient_privacy: bool,
}

impl GroupService {
    pub fn new(
        db: Arc<GroupDb>,
        events: Arc<EventBus>,
        policy: Arc<AccessPolicy>,
        lenient_privacy: bool,
    ) -> Self {
        Self {
            db,
            events,
            policy,
            lenient_privacy,
        }
    }

    // =========================================================================
    // Group lifecycle
    // =========================================================================

    /// Create a group with `founder_id` as its sole admin
    pub fn create_group(&self, founder_id: &str, input: CreateGroupInput) -> Result<GroupView, SanghaError> {
        let name = required_text(input.name.as_deref(), "name")?;
        let description = required_text(input.description.as_deref(), "description")?;
        let category = parse_category(input.category.as_deref())?.unwrap_or_default();
        let privacy = self.parse_privacy(input.privacy.as_deref())?;

        let now = current_timestamp();
        let new_group = NewGroup {
            id: new_id(),
            name,
            description,
            category,
            location: optional_text(input.location.as_deref()),
            privacy,
            cover_image: optional_text(input.cover_image.as_deref()),
            admin_id: founder_id.to_string(),
            created_at: now.clone(),
        };

        let group = self.db.with_tx(|tx| {
            groups::insert_group(tx, &new_group)?;
            members::insert_member(tx, &new_group.id, founder_id, Role::Admin, &now)?;
            groups::adjust_member_count(tx, &new_group.id, 1)?;
            groups::require_group(tx, &new_group.id)
        })?;

        self.events.emit(GroupEvent::GroupCreated {
            group_id: group.id.clone(),
            admin_id: group.admin_id.clone(),
            name: group.name.clone(),
        });

        Ok(group.into())
    }

    /// Groups the viewer can discover
    pub fn list_groups(&self, viewer_id: &str, query: &GroupQuery) -> Result<Vec<GroupView>, SanghaError> {
        let category = parse_category(query.category.as_deref())?;
        let search = optional_text(query.search.as_deref());

        let rows = self.db.with_conn(|conn| {
            groups::list_visible_groups(conn, viewer_id, category, search.as_deref())
        })?;
        debug!(viewer = %viewer_id, count = rows.len(), "Listed groups");

        Ok(rows.into_iter().map(GroupView::from).collect())
    }

    /// Group detail as seen by `viewer_id`
    pub fn get_group(&self, viewer_id: &str, group_id: &str) -> Result<GroupDetailView, SanghaError> {
        self.db.with_conn(|conn| {
            let group = groups::require_group(conn, group_id)?;
            let admin = UserDirectory::new(conn).resolve(&group.admin_id)?;
            let viewer_role = members::get_role(conn, group_id, viewer_id)?;
            let has_pending_request = requests::find_pending(conn, group_id, viewer_id)?.is_some();

            Ok(GroupDetailView {
                group: group.into(),
                admin: admin.into(),
                viewer_role,
                has_pending_request,
            })
        })
    }

    /// Hard delete; cascades to every store the group owns
    pub fn delete_group(&self, actor_id: &str, group_id: &str) -> Result<(), SanghaError> {
        self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, actor_id, Action::DeleteGroup)?;
            if !groups::delete_group(tx, group_id)? {
                return Err(SanghaError::GroupNotFound(group_id.to_string()));
            }
            Ok(())
        })?;

        self.events.emit(GroupEvent::GroupDeleted {
            group_id: group_id.to_string(),
            deleted_by: actor_id.to_string(),
        });
        Ok(())
    }

    // =========================================================================
    // Membership ledger
    // =========================================================================

    /// Admin plus every ledger entry, in join order
    pub fn list_members(&self, group_id: &str, search: Option<&str>) -> Result<MemberListView, SanghaError> {
        let search = optional_text(search);

        self.db.with_conn(|conn| {
            let group = groups::require_group(conn, group_id)?;
            let mut directory = UserDirectory::new(conn);
            let admin = AuthorView::from(directory.resolve(&group.admin_id)?);

            let members = members::list_members(conn, group_id, search.as_deref())?
                .into_iter()
                .map(|m| {
                    Ok(MemberView {
                        user: directory.resolve(&m.member_id)?.into(),
                        role: m.role,
                        joined_at: m.joined_at,
                    })
                })
                .collect::<Result<Vec<_>, SanghaError>>()?;

            Ok(MemberListView { admin, members })
        })
    }

    /// Join a public group directly
    pub fn join(&self, group_id: &str, actor_id: &str) -> Result<LedgerEntryView, SanghaError> {
        let entry = self.db.with_tx(|tx| {
            let (group, role) = authorize_in_group(tx, &self.policy, group_id, actor_id, Action::Join)?;
            if role.is_some() {
                return Err(SanghaError::AlreadyMember);
            }
            if group.privacy == Privacy::Private {
                return Err(SanghaError::PrivacyViolation);
            }

            let entry = members::insert_member(tx, group_id, actor_id, Role::Member, &current_timestamp())?;
            groups::adjust_member_count(tx, group_id, 1)?;
            Ok(entry)
        })?;

        info!(group = %group_id, member = %actor_id, "Member joined");
        self.events.emit(GroupEvent::MemberJoined {
            group_id: group_id.to_string(),
            member_id: actor_id.to_string(),
        });

        Ok(entry.into())
    }

    pub fn leave(&self, group_id: &str, actor_id: &str) -> Result<(), SanghaError> {
        self.db.with_tx(|tx| {
            let (_, role) = authorize_in_group(tx, &self.policy, group_id, actor_id, Action::Leave)?;
            if role == Some(Role::Admin) {
                return Err(SanghaError::AdminCannotLeave);
            }

            if !members::delete_member(tx, group_id, actor_id)? {
                return Err(SanghaError::NotMember(Action::Leave.describe().to_string()));
            }
            groups::adjust_member_count(tx, group_id, -1)
        })?;

        info!(group = %group_id, member = %actor_id, "Member left");
        self.events.emit(GroupEvent::MemberLeft {
            group_id: group_id.to_string(),
            member_id: actor_id.to_string(),
        });
        Ok(())
    }

    /// Assign `moderator` or `member` to a non-admin entry.
    ///
    /// The role name is validated before any store is read.
    pub fn set_role(
        &self,
        group_id: &str,
        acting_id: &str,
        target_id: &str,
        new_role: &str,
    ) -> Result<LedgerEntryView, SanghaError> {
        let role = new_role
            .trim()
            .parse::<Role>()
            .ok()
            .filter(Role::is_assignable)
            .ok_or_else(|| SanghaError::InvalidRole(new_role.to_string()))?;

        let entry = self.db.with_tx(|tx| {
            let (group, _) = authorize_in_group(tx, &self.policy, group_id, acting_id, Action::SetRole)?;
            if group.admin_id == target_id {
                return Err(SanghaError::TargetIsAdmin);
            }

            let mut entry = members::get_member(tx, group_id, target_id)?
                .ok_or_else(|| SanghaError::TargetNotMember(target_id.to_string()))?;
            if entry.role == Role::Admin {
                return Err(SanghaError::TargetIsAdmin);
            }

            members::update_role(tx, group_id, target_id, role)?;
            entry.role = role;
            Ok(entry)
        })?;

        self.events.emit(GroupEvent::RoleChanged {
            group_id: group_id.to_string(),
            member_id: target_id.to_string(),
            role,
        });

        Ok(entry.into())
    }

    pub fn remove(&self, group_id: &str, acting_id: &str, target_id: &str) -> Result<(), SanghaError> {
        self.db.with_tx(|tx| {
            let (group, _) = authorize_in_group(tx, &self.policy, group_id, acting_id, Action::Remove)?;
            if group.admin_id == target_id {
                return Err(SanghaError::TargetIsAdmin);
            }

            if !members::delete_member(tx, group_id, target_id)? {
                return Err(SanghaError::TargetNotMember(target_id.to_string()));
            }
            groups::adjust_member_count(tx, group_id, -1)
        })?;

        self.events.emit(GroupEvent::MemberRemoved {
            group_id: group_id.to_string(),
            member_id: target_id.to_string(),
            removed_by: acting_id.to_string(),
        });
        Ok(())
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn parse_privacy(&self, raw: Option<&str>) -> Result<Privacy, SanghaError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(Privacy::default()),
            Some(raw) => raw,
        };

        match raw.parse::<Privacy>() {
            Ok(privacy) => Ok(privacy),
            Err(bad) if self.lenient_privacy => {
                debug!(value = %bad, "Coercing unknown privacy to public");
                Ok(Privacy::Public)
            }
            Err(bad) => Err(SanghaError::InvalidInput(format!(
                "privacy must be 'public' or 'private', got '{}'",
                bad
            ))),
        }
    }
}

/// Category filter or attribute; blank and `All` mean none
fn parse_category(raw: Option<&str>) -> Result<Option<GroupCategory>, SanghaError> {
    match raw.map(str::trim) {
        None | Some("") | Some("All") => Ok(None),
        Some(raw) => raw
            .parse::<GroupCategory>()
            .map(Some)
            .map_err(|bad| SanghaError::InvalidInput(format!("Unknown group type '{}'", bad))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(lenient_privacy: bool) -> GroupService {
        GroupService::new(
            Arc::new(GroupDb::open_in_memory().unwrap()),
            Arc::new(EventBus::new()),
            Arc::new(AccessPolicy::new()),
            lenient_privacy,
        )
    }

    fn input(name: &str, privacy: Option<&str>) -> CreateGroupInput {
        CreateGroupInput {
            name: Some(name.into()),
            description: Some("weekly gathering".into()),
            privacy: privacy.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_defaults_public_community() {
        let svc = service(false);
        let group = svc.create_group("founder", input("Kirtan", None)).unwrap();
        assert_eq!(group.privacy, Privacy::Public);
        assert_eq!(group.category, GroupCategory::Community);
        assert_eq!(group.member_count, 1);
        assert_eq!(group.admin_id, "founder");
    }

    #[test]
    fn test_create_rejects_bad_privacy_unless_lenient() {
        let strict = service(false);
        assert!(matches!(
            strict.create_group("f", input("Kirtan", Some("secret"))),
            Err(SanghaError::InvalidInput(_))
        ));

        let lenient = service(true);
        let group = lenient.create_group("f", input("Kirtan", Some("secret"))).unwrap();
        assert_eq!(group.privacy, Privacy::Public);
    }

    #[test]
    fn test_create_rejects_blank_name_and_unknown_type() {
        let svc = service(false);
        assert!(svc.create_group("f", input("   ", None)).is_err());

        let mut bad_type = input("Kirtan", None);
        bad_type.category = Some("Sports".into());
        assert!(matches!(svc.create_group("f", bad_type), Err(SanghaError::InvalidInput(_))));
    }

    #[test]
    fn test_set_role_validates_before_lookup() {
        let svc = service(false);
        assert!(matches!(
            svc.set_role("no-such-group", "f", "m", "admin"),
            Err(SanghaError::InvalidRole(_))
        ));
        assert!(matches!(
            svc.set_role("no-such-group", "f", "m", "owner"),
            Err(SanghaError::InvalidRole(_))
        ));
        assert!(matches!(
            svc.set_role("no-such-group", "f", "m", "moderator"),
            Err(SanghaError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_leave_by_outsider_is_not_member() {
        let svc = service(false);
        let group = svc.create_group("f", input("Kirtan", None)).unwrap();
        assert!(matches!(svc.leave(&group.id, "stranger"), Err(SanghaError::NotMember(_))));
        assert!(matches!(svc.leave(&group.id, "f"), Err(SanghaError::AdminCannotLeave)));
    }
}
