//! Generative backend client: providers, quotas, pricing and prompt helpers.

mod client;
mod cost;
mod error;
mod prompts;
mod provider;
mod rate_limit;

pub use client::*;
pub use cost::{CostRates, TokenUsage};
pub use error::AiError;
pub use prompts::*;
pub use provider::*;
pub use rate_limit::{RateLimitStatus, RateLimiter, RateWindow};
