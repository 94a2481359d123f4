//! Directory lookup trait and an in-memory implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use chrono::Utc;

use super::{Agent, AgentStatus, Task, TaskPatch, TaskStatus};

/// Errors from a directory backend.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Failed to read directory file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse directory snapshot: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Directory backend failed: {0}")]
    Backend(String),
}

/// Agent and task facts consumed by the router.
///
/// A miss is `Ok(None)`; errors are reserved for backend failures.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, DirectoryError>;

    async fn get_agents_by_status(&self, status: AgentStatus) -> Result<Vec<Agent>, DirectoryError>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>, DirectoryError>;

    /// Apply `patch` and return the updated task.
    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>, DirectoryError>;
}

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    agents: Vec<Agent>,
    #[serde(default)]
    tasks: Vec<Task>,
}

/// Directory held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    agents: RwLock<HashMap<String, Agent>>,
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON document `{ "agents": [...], "tasks": [...] }`.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::ParseError` if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        let directory = Self::new();
        for agent in snapshot.agents {
            directory.insert_agent(agent);
        }
        for task in snapshot.tasks {
            directory.insert_task(task);
        }
        Ok(directory)
    }

    /// Load a JSON snapshot from disk.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::ReadError` or `DirectoryError::ParseError`.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), "Directory snapshot loaded");
        Ok(directory)
    }

    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn insert_agent(&self, agent: Agent) {
        self.agents
            .write()
            .expect("RwLock poisoned")
            .insert(agent.id.clone(), agent);
    }

    /// A completed task without a completion time is stamped now.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn insert_task(&self, mut task: Task) {
        if task.status == TaskStatus::Completed && task.completed_at.is_none() {
            task.completed_at = Some(Utc::now());
        }
        self.tasks
            .write()
            .expect("RwLock poisoned")
            .insert(task.id.clone(), task);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, DirectoryError> {
        Ok(self.agents.read().expect("RwLock poisoned").get(id).cloned())
    }

    async fn get_agents_by_status(&self, status: AgentStatus) -> Result<Vec<Agent>, DirectoryError> {
        let agents = self.agents.read().expect("RwLock poisoned");
        let mut matching: Vec<Agent> = agents
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, DirectoryError> {
        Ok(self.tasks.read().expect("RwLock poisoned").get(id).cloned())
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>, DirectoryError> {
        let mut tasks = self.tasks.write().expect("RwLock poisoned");
        Ok(tasks.get_mut(id).map(|task| {
            task.apply(patch);
            task.clone()
        }))
    }
}
