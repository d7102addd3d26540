//! Event system for group operations
//!
//! Services emit a [`GroupEvent`] after each committed mutation. The bus
//! feeds the audit logger and any other in-process subscriber.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::db::Role;

/// Domain events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    // Group lifecycle
    GroupCreated {
        group_id: String,
        admin_id: String,
        name: String,
    },
    GroupDeleted {
        group_id: String,
        deleted_by: String,
    },

    // Membership ledger
    MemberJoined {
        group_id: String,
        member_id: String,
    },
    MemberLeft {
        group_id: String,
        member_id: String,
    },
    MemberRemoved {
        group_id: String,
        member_id: String,
        removed_by: String,
    },
    RoleChanged {
        group_id: String,
        member_id: String,
        role: Role,
    },

    // Join requests
    JoinRequested {
        group_id: String,
        request_id: String,
        requester_id: String,
    },
    JoinAccepted {
        group_id: String,
        request_id: String,
        member_id: String,
    },
    JoinDeclined {
        group_id: String,
        request_id: String,
    },

    // Rule book
    RuleAdded {
        group_id: String,
        rule_id: String,
    },
    RuleUpdated {
        group_id: String,
        rule_id: String,
    },
    RuleRemoved {
        group_id: String,
        rule_id: String,
    },

    // Threads
    PostCreated {
        group_id: String,
        post_id: String,
        author_id: String,
    },
    PostLiked {
        post_id: String,
        actor_id: String,
    },
    PostUnliked {
        post_id: String,
        actor_id: String,
    },
    CommentAdded {
        post_id: String,
        comment_id: String,
        author_id: String,
    },
    ReplyAdded {
        post_id: String,
        comment_id: String,
        reply_id: String,
        author_id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &GroupEvent);
}

/// Event bus for broadcasting group events
pub struct EventBus {
    sender: broadcast::Sender<GroupEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: GroupEvent) {
        trace!(event = ?event, "Emitting group event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GroupEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit trail listener
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &GroupEvent) {
        match event {
            GroupEvent::GroupCreated { group_id, admin_id, name } => {
                info!(group = %group_id, admin = %admin_id, name = %name, "Group created");
            }
            GroupEvent::GroupDeleted { group_id, deleted_by } => {
                info!(group = %group_id, by = %deleted_by, "Group deleted");
            }
            GroupEvent::MemberRemoved { group_id, member_id, removed_by } => {
                info!(group = %group_id, member = %member_id, by = %removed_by, "Member removed");
            }
            GroupEvent::RoleChanged { group_id, member_id, role } => {
                info!(group = %group_id, member = %member_id, role = %role, "Role changed");
            }
            GroupEvent::JoinAccepted { group_id, member_id, .. } => {
                info!(group = %group_id, member = %member_id, "Join request accepted");
            }
            _ => {
                debug!(event = ?event, "Group event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(GroupEvent::MemberJoined {
            group_id: "g1".into(),
            member_id: "u1".into(),
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        assert_eq!(
            event,
            GroupEvent::MemberJoined {
                group_id: "g1".into(),
                member_id: "u1".into(),
            }
        );
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        bus.emit(GroupEvent::JoinDeclined {
            group_id: "g1".into(),
            request_id: "r1".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
