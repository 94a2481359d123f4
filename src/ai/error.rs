//! Backend client error types.

use super::RateWindow;

/// Errors from generative backend calls.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("API key not configured (env: {0})")]
    MissingApiKey(String),

    /// A quota window is exhausted. No request was sent.
    #[error("Rate limit exceeded: {limit} requests per {window}")]
    RateLimited { window: RateWindow, limit: u32 },

    #[error("Backend request failed: {0}")]
    Backend(String),

    #[error("Backend request timed out")]
    Timeout,

    #[error("Failed to parse backend response: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_display() {
        let err = AiError::RateLimited {
            window: RateWindow::Minute,
            limit: 60,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded: 60 requests per minute");
    }

    #[test]
    fn test_backend_display_keeps_detail() {
        let err = AiError::Backend("HTTP 500: boom".to_string());
        assert!(err.to_string().ends_with("HTTP 500: boom"));
    }
}
