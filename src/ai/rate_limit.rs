//! Per-minute and per-hour request quotas.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;

use super::AiError;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Quota window that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateWindow {
    Minute,
    Hour,
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minute => f.write_str("minute"),
            Self::Hour => f.write_str("hour"),
        }
    }
}

/// Snapshot of quota usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub minute_used: u32,
    pub hour_used: u32,
    pub minute_remaining: u32,
    pub hour_remaining: u32,
}

#[derive(Debug)]
struct Windows {
    minute_count: u32,
    hour_count: u32,
    minute_started: Instant,
    hour_started: Instant,
}

impl Windows {
    /// Lazily reset windows whose period has elapsed.
    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.minute_started) >= MINUTE {
            tracing::debug!(previous = self.minute_count, "Minute rate window reset");
            self.minute_count = 0;
            self.minute_started = now;
        }
        if now.saturating_duration_since(self.hour_started) >= HOUR {
            tracing::debug!(previous = self.hour_count, "Hour rate window reset");
            self.hour_count = 0;
            self.hour_started = now;
        }
    }
}

/// Counts requests against minute and hour ceilings.
///
/// The check and the increment happen under one lock, so concurrent callers
/// can never push a window past its limit.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimitConfig,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    /// Create a limiter whose windows start now.
    #[must_use]
    pub fn new(limits: RateLimitConfig) -> Self {
        Self::starting_at(limits, Instant::now())
    }

    /// Create a limiter whose windows start at `start`.
    #[must_use]
    pub fn starting_at(limits: RateLimitConfig, start: Instant) -> Self {
        Self {
            limits,
            windows: Mutex::new(Windows {
                minute_count: 0,
                hour_count: 0,
                minute_started: start,
                hour_started: start,
            }),
        }
    }

    /// Configured ceilings.
    #[must_use]
    pub fn limits(&self) -> RateLimitConfig {
        self.limits
    }

    /// Reserve one request slot.
    ///
    /// # Errors
    ///
    /// Returns `AiError::RateLimited` if either window is exhausted.
    pub fn try_acquire(&self) -> Result<(), AiError> {
        self.try_acquire_at(Instant::now())
    }

    /// Reserve one request slot as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `AiError::RateLimited` if either window is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), AiError> {
        let mut windows = self.windows.lock().expect("Mutex poisoned");
        windows.roll(now);

        if windows.minute_count >= self.limits.requests_per_minute {
            return Err(AiError::RateLimited {
                window: RateWindow::Minute,
                limit: self.limits.requests_per_minute,
            });
        }
        if windows.hour_count >= self.limits.requests_per_hour {
            return Err(AiError::RateLimited {
                window: RateWindow::Hour,
                limit: self.limits.requests_per_hour,
            });
        }

        windows.minute_count += 1;
        windows.hour_count += 1;
        Ok(())
    }

    /// Current usage of both windows.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn status(&self) -> RateLimitStatus {
        let mut windows = self.windows.lock().expect("Mutex poisoned");
        windows.roll(Instant::now());
        RateLimitStatus {
            minute_used: windows.minute_count,
            hour_used: windows.hour_count,
            minute_remaining: self
                .limits
                .requests_per_minute
                .saturating_sub(windows.minute_count),
            hour_remaining: self
                .limits
                .requests_per_hour
                .saturating_sub(windows.hour_count),
        }
    }
}
