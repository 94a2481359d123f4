//! Agent conversation router: delivery decisions, history and AI-backed
//! task operations.

mod error;
mod message;
mod notify;
mod parse;
mod service;

pub use error::RouterError;
pub use message::*;
pub use notify::*;
pub use parse::*;
pub use service::*;
