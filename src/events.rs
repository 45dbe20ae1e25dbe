//! Lifecycle events emitted by the build store.
//!
//! Events travel over an in-process channel so that store correctness never
//! depends on whoever consumes them. Delivery is fire-and-forget: emission
//! order is preserved, and an event sent after the receiver has gone is
//! dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A change to the set of servable preview builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A build was stored, replacing any earlier build of the same commit.
    BuildCreated {
        /// Pull request number.
        pr: u64,
        /// Commit the build was produced from.
        sha: String,
        /// Whether the build landed in the public subtree.
        is_public: bool,
    },
    /// The builds of a pull request were moved to match its trust status.
    VisibilityChanged {
        /// Pull request number.
        pr: u64,
        /// Every commit now in the requested location, in discovery order.
        shas: Vec<String>,
        /// Requested visibility.
        is_public: bool,
    },
}

impl LifecycleEvent {
    /// Pull request the event refers to.
    #[must_use]
    pub const fn pr(&self) -> u64 {
        match self {
            Self::BuildCreated { pr, .. } | Self::VisibilityChanged { pr, .. } => *pr,
        }
    }
}

/// Receiving half of the lifecycle event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<LifecycleEvent>;

/// Sending half of the lifecycle event channel.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: Option<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl EventEmitter {
    /// An emitter that drops every event.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// Queues an event for the consumer, if one is listening.
    pub fn emit(&self, event: LifecycleEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(unsent) = sender.send(event) {
            tracing::debug!("lifecycle event dropped, no consumer: {:?}", unsent.0);
        }
    }
}

/// Creates a connected emitter/receiver pair.
#[must_use]
pub fn channel() -> (EventEmitter, EventReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        EventEmitter {
            sender: Some(sender),
        },
        receiver,
    )
}

#[cfg(test)]
mod tests {
    use super::{EventEmitter, LifecycleEvent, channel};

    fn created(sha: &str) -> LifecycleEvent {
        LifecycleEvent::BuildCreated {
            pr: 42,
            sha: sha.to_owned(),
            is_public: false,
        }
    }

    #[test]
    fn events_arrive_in_emission_order() {
        let (emitter, mut receiver) = channel();
        emitter.emit(created("a"));
        emitter.emit(created("b"));

        assert_eq!(receiver.try_recv().ok(), Some(created("a")));
        assert_eq!(receiver.try_recv().ok(), Some(created("b")));
        assert!(receiver.try_recv().is_err(), "no further events expected");
    }

    #[test]
    fn emitting_without_consumer_is_silent() {
        let (emitter, receiver) = channel();
        drop(receiver);
        emitter.emit(created("a"));
        EventEmitter::disabled().emit(created("b"));
    }

    #[test]
    fn serialises_as_tagged_json() {
        let event = LifecycleEvent::VisibilityChanged {
            pr: 42,
            shas: vec!["abc123".to_owned()],
            is_public: true,
        };
        let json = serde_json::to_value(&event).expect("event should serialise");
        assert_eq!(
            json,
            serde_json::json!({
                "type": "visibility_changed",
                "pr": 42,
                "shas": ["abc123"],
                "is_public": true,
            })
        );
        assert_eq!(event.pr(), 42);
    }
}
