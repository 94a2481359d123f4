//! Router error types.

use crate::ai::AiError;
use crate::directory::DirectoryError;
use crate::templates::TemplateError;

/// Errors from router operations. Every variant names the ids involved.
#[derive(thiserror::Error, Debug)]
pub enum RouterError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The backend call for an agent, task or chat failed.
    #[error("AI generation failed for {target}: {source}")]
    AiGenerationFailed {
        target: String,
        #[source]
        source: AiError,
    },

    #[error("Failed to route message from {sender} to {receiver}: {source}")]
    RoutingFailed {
        sender: String,
        receiver: String,
        #[source]
        source: Box<RouterError>,
    },
}

impl RouterError {
    /// The backend error at the root of this error, if any.
    #[must_use]
    pub fn ai_error(&self) -> Option<&AiError> {
        match self {
            Self::AiGenerationFailed { source, .. } => Some(source),
            Self::RoutingFailed { source, .. } => source.ai_error(),
            _ => None,
        }
    }
}
