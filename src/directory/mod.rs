//! Agent and task directory consumed by the router.

mod store;
mod types;

pub use store::*;
pub use types::*;
