//! Prompt template registry.

mod defaults;
mod error;
mod registry;

pub use defaults::{
    default_templates, AGENT_COLLABORATION_REQUEST, AGENT_INTRODUCTION, AGENT_STATUS_UPDATE,
};
pub use error::TemplateError;
pub use registry::*;
