//! Error types for sangha
//!
//! Variants are grouped the way callers need to react to them: input
//! errors, authorization errors, state errors, not-found errors and
//! internal failures. `status_code` gives the HTTP class for each.

use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SanghaError {
    // Input errors
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid role specified: {0}")]
    InvalidRole(String),

    // Authorization errors
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Only group members can {0}")]
    NotMember(String),

    // State errors
    #[error("Already a member of this group")]
    AlreadyMember,

    #[error("This group is private, send a join request instead")]
    PrivacyViolation,

    #[error("This group is public, you can join directly")]
    NotPrivate,

    #[error("Join request already sent")]
    DuplicateRequest,

    #[error("Admin cannot leave the group")]
    AdminCannotLeave,

    #[error("Cannot change or remove the group admin")]
    TargetIsAdmin,

    // Not-found errors
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Member not found in group: {0}")]
    TargetNotMember(String),

    #[error("Join request not found: {0}")]
    RequestNotFound(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Comment not found: {0}")]
    CommentNotFound(String),

    #[error("Not found: {0}")]
    RouteNotFound(String),

    // Internal
    #[error("Malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SanghaError {
    /// HTTP status class for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidRole(_)
            | Self::Json(_)
            | Self::AlreadyMember
            | Self::PrivacyViolation
            | Self::NotPrivate
            | Self::DuplicateRequest
            | Self::AdminCannotLeave
            | Self::TargetIsAdmin => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::NotMember(_) => StatusCode::FORBIDDEN,
            Self::GroupNotFound(_)
            | Self::TargetNotMember(_)
            | Self::RequestNotFound(_)
            | Self::RuleNotFound(_)
            | Self::PostNotFound(_)
            | Self::CommentNotFound(_)
            | Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Io(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True for failures the caller did not cause
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Message safe to hand back to a client
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}
