//! Rule book service

use std::sync::Arc;

use serde::Deserialize;

use crate::authz::{AccessPolicy, Action};
use crate::db::models::{current_timestamp, new_id};
use crate::db::users::UserDirectory;
use crate::db::{groups, rules, GroupDb, RuleRow};
use crate::error::SanghaError;
use crate::views::RuleView;

use super::events::{EventBus, GroupEvent};
use super::{authorize_in_group, optional_text, required_text};

/// Body of add/update rule calls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleInput {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub struct RuleService {
    db: Arc<GroupDb>,
    events: Arc<EventBus>,
    policy: Arc<AccessPolicy>,
}

impl RuleService {
    pub fn new(db: Arc<GroupDb>, events: Arc<EventBus>, policy: Arc<AccessPolicy>) -> Self {
        Self { db, events, policy }
    }

    /// Rules in authoring order; readable without membership
    pub fn list(&self, group_id: &str) -> Result<Vec<RuleView>, SanghaError> {
        self.db.with_conn(|conn| {
            groups::require_group(conn, group_id)?;
            let mut directory = UserDirectory::new(conn);
            rules::list_rules(conn, group_id)?
                .into_iter()
                .map(|row| {
                    let creator = directory.resolve(&row.created_by)?;
                    Ok(RuleView::new(row, creator.into()))
                })
                .collect()
        })
    }

    pub fn add(&self, group_id: &str, acting_id: &str, input: RuleInput) -> Result<RuleView, SanghaError> {
        let title = required_text(input.title.as_deref(), "title")?;
        let description = optional_text(input.description.as_deref());

        let view = self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, acting_id, Action::AddRule)?;

            let now = current_timestamp();
            let row = RuleRow {
                id: new_id(),
                group_id: group_id.to_string(),
                title,
                description,
                created_by: acting_id.to_string(),
                created_at: now.clone(),
                updated_at: now,
            };
            rules::insert_rule(tx, &row)?;
            let creator = UserDirectory::new(tx).resolve(acting_id)?;
            Ok(RuleView::new(row, creator.into()))
        })?;

        self.events.emit(GroupEvent::RuleAdded {
            group_id: group_id.to_string(),
            rule_id: view.id.clone(),
        });
        Ok(view)
    }

    /// Replace title and description of a rule that belongs to the group
    pub fn update(
        &self,
        group_id: &str,
        acting_id: &str,
        rule_id: &str,
        input: RuleInput,
    ) -> Result<RuleView, SanghaError> {
        let title = required_text(input.title.as_deref(), "title")?;
        let description = optional_text(input.description.as_deref());

        let view = self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, acting_id, Action::UpdateRule)?;

            let updated = rules::update_rule(
                tx,
                group_id,
                rule_id,
                &title,
                description.as_deref(),
                &current_timestamp(),
            )?;
            if !updated {
                return Err(SanghaError::RuleNotFound(rule_id.to_string()));
            }

            let row = rules::get_rule(tx, group_id, rule_id)?
                .ok_or_else(|| SanghaError::RuleNotFound(rule_id.to_string()))?;
            let creator = UserDirectory::new(tx).resolve(&row.created_by)?;
            Ok(RuleView::new(row, creator.into()))
        })?;

        self.events.emit(GroupEvent::RuleUpdated {
            group_id: group_id.to_string(),
            rule_id: rule_id.to_string(),
        });
        Ok(view)
    }

    pub fn remove(&self, group_id: &str, acting_id: &str, rule_id: &str) -> Result<(), SanghaError> {
        self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, acting_id, Action::DeleteRule)?;
            if !rules::delete_rule(tx, group_id, rule_id)? {
                return Err(SanghaError::RuleNotFound(rule_id.to_string()));
            }
            Ok(())
        })?;

        self.events.emit(GroupEvent::RuleRemoved {
            group_id: group_id.to_string(),
            rule_id: rule_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::group_service::{CreateGroupInput, GroupService};

    fn setup() -> (GroupService, RuleService, String) {
        let db = Arc::new(GroupDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let policy = Arc::new(AccessPolicy::new());
        let groups = GroupService::new(db.clone(), events.clone(), policy.clone(), false);
        let rules = RuleService::new(db, events, policy);
        let group = groups
            .create_group(
                "admin",
                CreateGroupInput {
                    name: Some("Ashram".into()),
                    description: Some("daily sadhana".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        (groups, rules, group.id)
    }

    fn rule(title: &str) -> RuleInput {
        RuleInput {
            title: Some(title.into()),
            description: Some("be kind".into()),
        }
    }

    #[test]
    fn test_rules_keep_authoring_order() {
        let (_, rules, gid) = setup();
        rules.add(&gid, "admin", rule("First")).unwrap();
        rules.add(&gid, "admin", rule("Second")).unwrap();
        rules.add(&gid, "admin", rule("Third")).unwrap();

        let titles: Vec<_> = rules.list(&gid).unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_member_cannot_add_rule() {
        let (groups, rules, gid) = setup();
        groups.join(&gid, "devotee").unwrap();
        assert!(matches!(
            rules.add(&gid, "devotee", rule("Mine")),
            Err(SanghaError::Forbidden(_))
        ));
        assert!(rules.list(&gid).unwrap().is_empty());
    }

    #[test]
    fn test_update_rule_of_other_group_is_not_found() {
        let (groups, rules, gid) = setup();
        let other = groups
            .create_group(
                "admin",
                CreateGroupInput {
                    name: Some("Other".into()),
                    description: Some("elsewhere".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let foreign = rules.add(&other.id, "admin", rule("Theirs")).unwrap();

        assert!(matches!(
            rules.update(&gid, "admin", &foreign.id, rule("Hijack")),
            Err(SanghaError::RuleNotFound(_))
        ));
        assert!(matches!(
            rules.remove(&gid, "admin", &foreign.id),
            Err(SanghaError::RuleNotFound(_))
        ));
    }

    #[test]
    fn test_update_replaces_fields() {
        let (_, rules, gid) = setup();
        let added = rules.add(&gid, "admin", rule("Silence")).unwrap();
        let updated = rules
            .update(
                &gid,
                "admin",
                &added.id,
                RuleInput {
                    title: Some("Noble silence".into()),
                    description: None,
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Noble silence");
        assert_eq!(updated.description, None);
        assert_eq!(updated.created_at, added.created_at);
    }
}
