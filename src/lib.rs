//! Collab Orchestrator - AI agent routing with cost governance.

pub mod ai;
pub mod config;
pub mod cost;
pub mod directory;
pub mod display;
pub mod router;
pub mod templates;
