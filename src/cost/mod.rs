//! Cost ledger, budgets and alerts.

mod scheduler;
mod tracker;
mod types;

pub use scheduler::*;
pub use tracker::*;
pub use types::*;
