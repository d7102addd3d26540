//! Join-request service - the queue in front of private groups
//!
//! Accepting a request deletes it and writes the ledger entry in the same
//! transaction; no observer can see both or neither.

use std::sync::Arc;

use tracing::info;

use crate::authz::{AccessPolicy, Action};
use crate::db::models::{current_timestamp, new_id};
use crate::db::users::UserDirectory;
use crate::db::{groups, members, requests, GroupDb, JoinRequestRow, Privacy, Role};
use crate::error::SanghaError;
use crate::views::{JoinRequestView, LedgerEntryView};

use super::authorize_in_group;
use super::events::{EventBus, GroupEvent};

pub struct RequestService {
    db: Arc<GroupDb>,
    events: Arc<EventBus>,
    policy: Arc<AccessPolicy>,
}

impl RequestService {
    pub fn new(db: Arc<GroupDb>, events: Arc<EventBus>, policy: Arc<AccessPolicy>) -> Self {
        Self { db, events, policy }
    }

    /// Ask to join a private group
    pub fn request(&self, group_id: &str, actor_id: &str) -> Result<JoinRequestView, SanghaError> {
        let (row, user) = self.db.with_tx(|tx| {
            let (group, role) =
                authorize_in_group(tx, &self.policy, group_id, actor_id, Action::RequestJoin)?;
            if group.privacy == Privacy::Public {
                return Err(SanghaError::NotPrivate);
            }
            if role.is_some() {
                return Err(SanghaError::AlreadyMember);
            }
            if requests::find_pending(tx, group_id, actor_id)?.is_some() {
                return Err(SanghaError::DuplicateRequest);
            }

            let row = JoinRequestRow {
                id: new_id(),
                group_id: group_id.to_string(),
                requester_id: actor_id.to_string(),
                requested_at: current_timestamp(),
            };
            requests::insert_request(tx, &row)?;
            let user = UserDirectory::new(tx).resolve(actor_id)?;
            Ok((row, user))
        })?;

        self.events.emit(GroupEvent::JoinRequested {
            group_id: group_id.to_string(),
            request_id: row.id.clone(),
            requester_id: actor_id.to_string(),
        });

        Ok(JoinRequestView::new(row, user.into()))
    }

    /// Pending requests, oldest first (admin only)
    pub fn list_pending(&self, group_id: &str, acting_id: &str) -> Result<Vec<JoinRequestView>, SanghaError> {
        self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, acting_id, Action::ViewRequests)?;

            let mut directory = UserDirectory::new(tx);
            requests::list_pending(tx, group_id)?
                .into_iter()
                .map(|row| {
                    let user = directory.resolve(&row.requester_id)?;
                    Ok(JoinRequestView::new(row, user.into()))
                })
                .collect()
        })
    }

    /// Turn a pending request into a `member` ledger entry
    pub fn accept(&self, group_id: &str, acting_id: &str, request_id: &str) -> Result<LedgerEntryView, SanghaError> {
        let entry = self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, acting_id, Action::AcceptRequest)?;

            let request = requests::get_request(tx, group_id, request_id)?
                .ok_or_else(|| SanghaError::RequestNotFound(request_id.to_string()))?;
            requests::delete_request(tx, group_id, request_id)?;

            if let Some(existing) = members::get_member(tx, group_id, &request.requester_id)? {
                return Ok(existing);
            }

            let entry = members::insert_member(
                tx,
                group_id,
                &request.requester_id,
                Role::Member,
                &current_timestamp(),
            )?;
            groups::adjust_member_count(tx, group_id, 1)?;
            Ok(entry)
        })?;

        info!(group = %group_id, member = %entry.member_id, by = %acting_id, "Join request accepted");
        self.events.emit(GroupEvent::JoinAccepted {
            group_id: group_id.to_string(),
            request_id: request_id.to_string(),
            member_id: entry.member_id.clone(),
        });

        Ok(entry.into())
    }

    /// Discard a pending request
    pub fn decline(&self, group_id: &str, acting_id: &str, request_id: &str) -> Result<(), SanghaError> {
        self.db.with_tx(|tx| {
            authorize_in_group(tx, &self.policy, group_id, acting_id, Action::DeclineRequest)?;
            if !requests::delete_request(tx, group_id, request_id)? {
                return Err(SanghaError::RequestNotFound(request_id.to_string()));
            }
            Ok(())
        })?;

        self.events.emit(GroupEvent::JoinDeclined {
            group_id: group_id.to_string(),
            request_id: request_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::group_service::{CreateGroupInput, GroupService};

    fn setup() -> (GroupService, RequestService, String) {
        let db = Arc::new(GroupDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let policy = Arc::new(AccessPolicy::new());
        let groups = GroupService::new(db.clone(), events.clone(), policy.clone(), false);
        let requests = RequestService::new(db, events, policy);

        let group = groups
            .create_group(
                "guru",
                CreateGroupInput {
                    name: Some("Inner circle".into()),
                    description: Some("closed study".into()),
                    privacy: Some("private".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        (groups, requests, group.id)
    }

    #[test]
    fn test_request_then_accept() {
        let (groups, requests, gid) = setup();
        let pending = requests.request(&gid, "seeker").unwrap();
        assert_eq!(pending.user.username, "seeker");

        let entry = requests.accept(&gid, "guru", &pending.id).unwrap();
        assert_eq!(entry.role, Role::Member);
        assert!(requests.list_pending(&gid, "guru").unwrap().is_empty());
        assert_eq!(groups.get_group("seeker", &gid).unwrap().group.member_count, 2);
    }

    #[test]
    fn test_duplicate_request_rejected() {
        let (_, requests, gid) = setup();
        requests.request(&gid, "seeker").unwrap();
        assert!(matches!(
            requests.request(&gid, "seeker"),
            Err(SanghaError::DuplicateRequest)
        ));
    }

    #[test]
    fn test_admin_cannot_request_own_group() {
        let (_, requests, gid) = setup();
        assert!(matches!(requests.request(&gid, "guru"), Err(SanghaError::AlreadyMember)));
    }

    #[test]
    fn test_decline_unknown_request() {
        let (_, requests, gid) = setup();
        assert!(matches!(
            requests.decline(&gid, "guru", "nope"),
            Err(SanghaError::RequestNotFound(_))
        ));
    }
}
