//! Authorization gate
//!
//! One decision table maps every group action to the level it needs. The
//! gate is a pure function of (action, the actor's current role); services
//! look the role up inside the same transaction as the mutation that
//! follows, so a role cannot change between the check and the write.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::Role;
use crate::error::SanghaError;

/// Actions an actor can attempt against a group or its threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Post,
    Like,
    Comment,
    Reply,
    AddRule,
    UpdateRule,
    DeleteRule,
    SetRole,
    Remove,
    ViewRequests,
    AcceptRequest,
    DeclineRequest,
    Join,
    RequestJoin,
    Leave,
    DeleteGroup,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::Post,
        Action::Like,
        Action::Comment,
        Action::Reply,
        Action::AddRule,
        Action::UpdateRule,
        Action::DeleteRule,
        Action::SetRole,
        Action::Remove,
        Action::ViewRequests,
        Action::AcceptRequest,
        Action::DeclineRequest,
        Action::Join,
        Action::RequestJoin,
        Action::Leave,
        Action::DeleteGroup,
    ];

    /// Level required when no override is configured
    pub fn default_level(&self) -> AccessLevel {
        match self {
            Action::Like | Action::Comment | Action::Reply => AccessLevel::Anyone,
            Action::Join | Action::RequestJoin => AccessLevel::Anyone,
            Action::Post | Action::Leave => AccessLevel::Member,
            Action::AddRule
            | Action::UpdateRule
            | Action::DeleteRule
            | Action::SetRole
            | Action::Remove
            | Action::ViewRequests
            | Action::AcceptRequest
            | Action::DeclineRequest
            | Action::DeleteGroup => AccessLevel::Admin,
        }
    }

    /// Phrase used in denial messages ("Only admin can <phrase>")
    pub fn describe(&self) -> &'static str {
        match self {
            Action::Post => "create posts",
            Action::Like => "like posts",
            Action::Comment => "comment on posts",
            Action::Reply => "reply to comments",
            Action::AddRule => "add rules",
            Action::UpdateRule => "update rules",
            Action::DeleteRule => "delete rules",
            Action::SetRole => "update member roles",
            Action::Remove => "remove members",
            Action::ViewRequests => "view join requests",
            Action::AcceptRequest => "accept join requests",
            Action::DeclineRequest => "decline join requests",
            Action::Join => "join groups",
            Action::RequestJoin => "request to join groups",
            Action::Leave => "leave the group",
            Action::DeleteGroup => "delete the group",
        }
    }
}

/// Required standing in the group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Any authenticated actor
    Anyone,
    /// Any ledger entry, whatever its role
    Member,
    /// The group's admin entry
    Admin,
}

/// Decision table, with per-deployment overrides on top of the defaults
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    overrides: HashMap<Action, AccessLevel>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a ledger entry to comment and reply
    pub fn with_member_comments(mut self, required: bool) -> Self {
        if required {
            self.overrides.insert(Action::Comment, AccessLevel::Member);
            self.overrides.insert(Action::Reply, AccessLevel::Member);
        }
        self
    }

    /// Require a ledger entry to like posts
    pub fn with_member_likes(mut self, required: bool) -> Self {
        if required {
            self.overrides.insert(Action::Like, AccessLevel::Member);
        }
        self
    }

    pub fn required_level(&self, action: Action) -> AccessLevel {
        self.overrides
            .get(&action)
            .copied()
            .unwrap_or_else(|| action.default_level())
    }

    /// Decide whether an actor holding `role` (None = no ledger entry) may
    /// perform `action`.
    pub fn authorize(&self, action: Action, role: Option<Role>) -> Result<(), SanghaError> {
        authorize_level(self.required_level(action), action, role)
    }
}

/// The gate itself: level check against the current role
pub fn authorize_level(level: AccessLevel, action: Action, role: Option<Role>) -> Result<(), SanghaError> {
    match (level, role) {
        (AccessLevel::Anyone, _) => Ok(()),
        (AccessLevel::Member, Some(_)) => Ok(()),
        (AccessLevel::Member, None) => Err(SanghaError::NotMember(action.describe().to_string())),
        (AccessLevel::Admin, Some(Role::Admin)) => Ok(()),
        (AccessLevel::Admin, _) => Err(SanghaError::Forbidden(format!(
            "Only admin can {}",
            action.describe()
        ))),
    }
}
