//! Sangha - group membership and moderation service
//!
//! Backs community groups for the mobile client: who belongs to a group and
//! with what role, who is waiting to get in, the group's rule book, and its
//! discussion threads.
//!
//! ## Architecture
//!
//! - **Membership Ledger**: one entry per (group, member), exactly one admin
//! - **Join-Request Queue**: pending requests against private groups
//! - **Rule Book**: ordered, admin-authored rules
//! - **Discussion Threads**: posts with like sets, comments and replies
//! - **Authorization Gate**: one decision table in front of every mutation
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/sangha/
//! ├── sangha.db              # SQLite (WAL)
//! └── config.toml            # Configuration
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod authz;
pub mod db;
pub mod views;
pub mod services;
pub mod http;

// Re-exports
pub use config::Config;
pub use error::SanghaError;
pub use identity::{Actor, ForwardedIdentity, IdentityProvider};
pub use authz::{AccessLevel, AccessPolicy, Action};
pub use db::{GroupDb, GroupCategory, Privacy, Role};
pub use services::{EventBus, GroupEvent, Services};
pub use http::HttpServer;
