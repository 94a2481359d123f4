//! Conversation messages and the per-agent queue store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::PreviousMessage;
use crate::directory::{Metadata, Priority};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Action,
    Request,
    Response,
}

/// One message between agents, owned by the receiver's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    /// A text message with a fresh id and medium priority.
    #[must_use]
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: new_message_id(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
            message_type: MessageType::Text,
            priority: Priority::Medium,
            metadata: Metadata::new(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Task id carried in metadata under `taskId`, if any.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.metadata.get("taskId").and_then(serde_json::Value::as_str)
    }

    /// The reply to this message: sender and receiver swapped, same priority,
    /// metadata kept and tagged with `responseTo`.
    #[must_use]
    pub fn reply(&self, content: impl Into<String>) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.insert(
            "responseTo".to_string(),
            serde_json::Value::String(self.id.clone()),
        );
        Self {
            id: new_message_id(),
            sender_id: self.receiver_id.clone(),
            receiver_id: self.sender_id.clone(),
            content: content.into(),
            message_type: MessageType::Response,
            priority: self.priority,
            metadata,
            timestamp: Utc::now(),
        }
    }
}

impl From<&ConversationMessage> for PreviousMessage {
    fn from(message: &ConversationMessage) -> Self {
        Self {
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

/// Append-only message queues keyed by agent id.
///
/// A single lock guards the whole map, so each append (or appended pair)
/// lands intact.
#[derive(Debug, Default)]
pub struct ConversationStore {
    queues: Mutex<HashMap<String, Vec<ConversationMessage>>>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message to an agent's queue.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn queue(&self, agent_id: &str, message: ConversationMessage) {
        self.append(agent_id, [message]);
    }

    /// Append messages back to back, with no other append in between.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn append<I>(&self, agent_id: &str, messages: I)
    where
        I: IntoIterator<Item = ConversationMessage>,
    {
        let mut queues = self.queues.lock().expect("Mutex poisoned");
        let queue = queues.entry(agent_id.to_string()).or_default();
        let before = queue.len();
        queue.extend(messages);
        tracing::debug!(agent_id, appended = queue.len() - before, "History appended");
    }

    /// The last `limit` messages of an agent's queue, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn history(&self, agent_id: &str, limit: usize) -> Vec<ConversationMessage> {
        let queues = self.queues.lock().expect("Mutex poisoned");
        queues.get(agent_id).map_or_else(Vec::new, |queue| {
            queue[queue.len().saturating_sub(limit)..].to_vec()
        })
    }

    /// Discard an agent's queue. Returns whether one existed.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn clear(&self, agent_id: &str) -> bool {
        self.queues
            .lock()
            .expect("Mutex poisoned")
            .remove(agent_id)
            .is_some()
    }

    /// Number of agents with a queue and total messages queued.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let queues = self.queues.lock().expect("Mutex poisoned");
        (queues.len(), queues.values().map(Vec::len).sum())
    }
}
