//! Actor identity
//!
//! Credentials are verified upstream (the gateway terminates the session
//! and forwards the verified caller). This module only turns what the
//! gateway forwards into an [`Actor`]; it never re-checks credentials.
//!
//! ## Forwarded headers
//!
//! | Header | Required | Meaning |
//! |--------|----------|---------|
//! | `x-actor-id` | yes | Stable actor identifier |
//! | `x-actor-name` | no | Display name (defaults to the id) |
//! | `x-actor-avatar` | no | Profile picture reference |

use async_trait::async_trait;
use hyper::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::SanghaError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";
pub const ACTOR_AVATAR_HEADER: &str = "x-actor-avatar";

/// A verified caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Resolves an inbound request to a verified actor
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Actor, SanghaError>;
}

/// Trusts the identity headers set by the upstream gateway
#[derive(Debug, Clone, Default)]
pub struct ForwardedIdentity;

impl ForwardedIdentity {
    /// Header text as UTF-8. `HeaderValue::to_str` would reject non-ASCII names.
    fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
        headers
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl IdentityProvider for ForwardedIdentity {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Actor, SanghaError> {
        let id = Self::header(headers, ACTOR_ID_HEADER).ok_or_else(|| {
            SanghaError::Unauthenticated(format!("missing {} header", ACTOR_ID_HEADER))
        })?;
        let display_name = Self::header(headers, ACTOR_NAME_HEADER).unwrap_or(id);

        let mut actor = Actor::new(id, display_name);
        if let Some(avatar) = Self::header(headers, ACTOR_AVATAR_HEADER) {
            actor = actor.with_avatar(avatar);
        }
        Ok(actor)
    }
}
