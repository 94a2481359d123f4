//! Background budget rollover and retention sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{BudgetPeriod, CostTracker};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Time from `now` until the next local midnight.
///
/// Returns `None` if that midnight does not exist in the zone.
#[must_use]
pub fn duration_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<Duration> {
    let tomorrow = now.date_naive().succ_opt()?;
    until_start_of(now, tomorrow)
}

/// Time from `now` until local midnight on the first day of the next month.
///
/// Returns `None` if that midnight does not exist in the zone.
#[must_use]
pub fn duration_until_next_month<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<Duration> {
    let date = now.date_naive();
    let first = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)?
    };
    until_start_of(now, first)
}

fn until_start_of<Tz: TimeZone>(now: &DateTime<Tz>, date: NaiveDate) -> Option<Duration> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    let target = now.timezone().from_local_datetime(&midnight).earliest()?;
    target.signed_duration_since(now.clone()).to_std().ok()
}

/// Owns the rollover and retention tasks for one tracker.
#[derive(Debug)]
pub struct BudgetScheduler {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BudgetScheduler {
    /// Spawn the daily reset, monthly reset and retention tasks.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(tracker: Arc<CostTracker>) -> Self {
        let cancel = CancellationToken::new();

        let daily = tokio::spawn(run_rollover(
            Arc::clone(&tracker),
            cancel.clone(),
            BudgetPeriod::Daily,
        ));
        let monthly = tokio::spawn(run_rollover(
            Arc::clone(&tracker),
            cancel.clone(),
            BudgetPeriod::Monthly,
        ));
        let retention = tokio::spawn(run_retention(tracker, cancel.clone()));

        tracing::debug!("Budget scheduler started");
        Self {
            cancel,
            handles: vec![daily, monthly, retention],
        }
    }

    /// Token that stops every task when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every task and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Budget scheduler task ended abnormally");
            }
        }
        tracing::debug!("Budget scheduler stopped");
    }
}

/// Sleep until the next boundary for `period`, reset, and re-arm.
async fn run_rollover(tracker: Arc<CostTracker>, cancel: CancellationToken, period: BudgetPeriod) {
    loop {
        let now = Local::now();
        let next = match period {
            BudgetPeriod::Monthly => duration_until_next_month(&now),
            _ => duration_until_next_midnight(&now),
        };
        let wait = next.unwrap_or(DAY);

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(wait) => {
                tracker.reset_period(period);
            }
        }
    }
}

async fn run_retention(tracker: Arc<CostTracker>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(DAY) => {
                tracker.sweep_retention(Utc::now());
            }
        }
    }
}
