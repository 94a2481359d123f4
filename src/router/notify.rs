//! Outbound events for the push transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::ConversationMessage;

/// Event emitted by the router. Delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouterEvent {
    /// A message was forwarded to a human or bot channel.
    MessageDelivered {
        agent_id: String,
        message: ConversationMessage,
    },
    /// An AI agent produced a reply.
    AiReplyGenerated {
        agent_id: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl RouterEvent {
    #[must_use]
    pub fn agent_id(&self) -> &str {
        match self {
            Self::MessageDelivered { agent_id, .. } | Self::AiReplyGenerated { agent_id, .. } => {
                agent_id
            }
        }
    }
}

/// Sink for router events.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: RouterEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: RouterEvent) {}
}

/// Fans events out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<RouterEvent>,
}

impl BroadcastNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: RouterEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}
