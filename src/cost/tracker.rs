//! In-memory cost ledger with budgets and threshold alerts.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BudgetConfig;

use super::{
    AlertSeverity, Breakdown, Budget, BudgetAlert, BudgetPeriod, BudgetStatus, CostEvent,
    CostFilter, CostForecast, CostSummary, ForecastConfidence, NewCostEvent, Seasonality, Trend,
};

/// Key of the global daily budget created at startup.
pub const DEFAULT_DAILY_BUDGET: &str = "default_daily";
/// Key of the global monthly budget created at startup.
pub const DEFAULT_MONTHLY_BUDGET: &str = "default_monthly";

/// A single event above this cost is logged as a warning.
const HIGH_COST_THRESHOLD: f64 = 1.0;
const SUMMARY_DEFAULT_DAYS: i64 = 30;
const FORECAST_WINDOW_DAYS: i64 = 7;
const EVENT_RETENTION_DAYS: i64 = 90;
const ALERT_RETENTION_DAYS: i64 = 30;

/// Budgets are unique per `(user, key)`.
type BudgetId = (Option<String>, String);

#[derive(Debug, Default)]
struct Ledger {
    events: Vec<CostEvent>,
    budgets: BTreeMap<BudgetId, Budget>,
    alerts: Vec<BudgetAlert>,
    emergency_stopped: bool,
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSweep {
    pub events_removed: usize,
    pub alerts_removed: usize,
}

/// Records billable calls and accumulates them into budgets.
///
/// Every mutation takes the same lock, so appending an event, accumulating
/// it and checking thresholds is atomic with respect to other callers and
/// to the background rollover tasks.
#[derive(Debug)]
pub struct CostTracker {
    ledger: Mutex<Ledger>,
}

impl CostTracker {
    /// Create a tracker with the default daily and monthly budgets.
    #[must_use]
    pub fn new(config: &BudgetConfig) -> Self {
        let tracker = Self::empty();
        tracker.set_budget(DEFAULT_DAILY_BUDGET, config.daily_limit, BudgetPeriod::Daily, None);
        tracker.set_budget(
            DEFAULT_MONTHLY_BUDGET,
            config.monthly_limit,
            BudgetPeriod::Monthly,
            None,
        );
        tracker
    }

    /// Create a tracker with no budgets.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Record an event stamped now.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn track(&self, event: NewCostEvent) -> CostEvent {
        self.track_at(event, Utc::now())
    }

    /// Record an event stamped `timestamp`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn track_at(&self, event: NewCostEvent, timestamp: DateTime<Utc>) -> CostEvent {
        let event = CostEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            user_id: event.user_id,
            agent_id: event.agent_id,
            task_id: event.task_id,
            request_type: event.request_type,
            model: event.model,
            usage: event.usage,
            cost: event.cost,
            metadata: event.metadata,
        };

        let mut ledger = self.ledger.lock().expect("Mutex poisoned");
        ledger.events.push(event.clone());

        let mut raised = Vec::new();
        for budget in ledger.budgets.values_mut() {
            if !budget.applies_to(event.user_id.as_deref()) {
                continue;
            }
            let before = budget.percentage();
            budget.spent += event.cost;
            let after = budget.percentage();
            if let Some(severity) = crossed_threshold(before, after) {
                raised.push(new_alert(budget, severity, after, &event));
            }
        }
        for alert in &raised {
            tracing::warn!(
                budget = %alert.budget_key,
                severity = ?alert.severity,
                spent = alert.spent,
                limit = alert.limit,
                "Budget alert created"
            );
        }
        ledger.alerts.extend(raised);
        drop(ledger);

        if event.cost > HIGH_COST_THRESHOLD {
            tracing::warn!(
                cost = event.cost,
                tokens = event.usage.total_tokens,
                request_type = %event.request_type,
                user_id = ?event.user_id,
                "High cost AI request"
            );
        }
        tracing::info!(
            event_id = %event.id,
            cost = event.cost,
            tokens = event.usage.total_tokens,
            request_type = %event.request_type,
            "Cost tracked"
        );

        event
    }

    /// Aggregate events matching `filter`, as of now.
    #[must_use]
    pub fn summary(&self, filter: &CostFilter) -> CostSummary {
        self.summary_at(filter, Utc::now())
    }

    /// Aggregate events matching `filter`; missing bounds are taken relative to `now`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn summary_at(&self, filter: &CostFilter, now: DateTime<Utc>) -> CostSummary {
        let start = filter
            .start
            .unwrap_or_else(|| now - Duration::days(SUMMARY_DEFAULT_DAYS));
        let end = filter.end.unwrap_or(now);

        let mut summary = CostSummary {
            total_cost: 0.0,
            total_tokens: 0,
            total_requests: 0,
            by_model: BTreeMap::new(),
            by_request_type: BTreeMap::new(),
            by_day: BTreeMap::new(),
            start,
            end,
        };

        let ledger = self.ledger.lock().expect("Mutex poisoned");
        let matching = ledger
            .events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .filter(|e| filter.matches(e));
        for event in matching {
            summary.total_cost += event.cost;
            summary.total_tokens += event.usage.total_tokens;
            summary.total_requests += 1;
            summary
                .by_model
                .entry(event.model.clone())
                .or_insert_with(Breakdown::default)
                .add(event);
            summary
                .by_request_type
                .entry(event.request_type)
                .or_insert_with(Breakdown::default)
                .add(event);
            summary
                .by_day
                .entry(event.timestamp.format("%Y-%m-%d").to_string())
                .or_insert_with(Breakdown::default)
                .add(event);
        }
        summary
    }

    /// Project spend over the next `days` from the last seven days.
    #[must_use]
    pub fn forecast(&self, days: u32) -> CostForecast {
        self.forecast_at(days, Utc::now())
    }

    /// Project spend over the next `days` from the seven days before `now`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn forecast_at(&self, days: u32, now: DateTime<Utc>) -> CostForecast {
        let window = self.summary_at(
            &CostFilter::between(now - Duration::days(FORECAST_WINDOW_DAYS), now),
            now,
        );

        let window_days = FORECAST_WINDOW_DAYS as f64;
        let daily_average = window.total_cost / window_days;
        let daily_costs: Vec<f64> = window.by_day.values().map(|b| b.cost).collect();

        let confidence = match daily_costs.len() {
            n if n >= 5 => ForecastConfidence::High,
            n if n >= 3 => ForecastConfidence::Medium,
            _ => ForecastConfidence::Low,
        };

        CostForecast {
            projected_cost: daily_average * f64::from(days),
            projected_tokens: window.total_tokens as f64 / window_days * f64::from(days),
            confidence,
            daily_average,
            trend: analyze_trend(&daily_costs),
            seasonality: Seasonality::None,
        }
    }

    /// Create or replace a budget with zero spend.
    ///
    /// After an emergency stop the limit is forced to zero.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn set_budget(&self, key: &str, limit: f64, period: BudgetPeriod, user_id: Option<&str>) {
        let mut ledger = self.ledger.lock().expect("Mutex poisoned");
        let limit = if ledger.emergency_stopped {
            tracing::warn!(key, requested = limit, "Emergency stop active, budget limit held at zero");
            0.0
        } else {
            limit
        };
        let budget = Budget {
            key: key.to_string(),
            user_id: user_id.map(String::from),
            limit,
            spent: 0.0,
            period,
        };
        ledger
            .budgets
            .insert((budget.user_id.clone(), budget.key.clone()), budget);
        drop(ledger);
        tracing::info!(key, limit, %period, user_id = ?user_id, "Budget set");
    }

    /// Status of one budget, or `None` if no such budget exists.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn budget_status(&self, key: &str, user_id: Option<&str>) -> Option<BudgetStatus> {
        let ledger = self.ledger.lock().expect("Mutex poisoned");
        ledger
            .budgets
            .get(&(user_id.map(String::from), key.to_string()))
            .map(BudgetStatus::from)
    }

    /// Alerts raised for `user_id`, or all alerts when `None`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn alerts(&self, user_id: Option<&str>) -> Vec<BudgetAlert> {
        let ledger = self.ledger.lock().expect("Mutex poisoned");
        ledger
            .alerts
            .iter()
            .filter(|a| user_id.is_none() || a.user_id.as_deref() == user_id)
            .cloned()
            .collect()
    }

    /// Drop alerts raised for `user_id`, or all alerts when `None`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn clear_alerts(&self, user_id: Option<&str>) {
        let mut ledger = self.ledger.lock().expect("Mutex poisoned");
        match user_id {
            Some(id) => ledger.alerts.retain(|a| a.user_id.as_deref() != Some(id)),
            None => ledger.alerts.clear(),
        }
    }

    /// Snapshot of the event log, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<CostEvent> {
        self.ledger.lock().expect("Mutex poisoned").events.clone()
    }

    /// Snapshot of every budget.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn budgets(&self) -> Vec<Budget> {
        self.ledger
            .lock()
            .expect("Mutex poisoned")
            .budgets
            .values()
            .cloned()
            .collect()
    }

    /// Zero the spend of every budget with the given period. Returns how many were reset.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn reset_period(&self, period: BudgetPeriod) -> usize {
        let mut ledger = self.ledger.lock().expect("Mutex poisoned");
        let mut reset = 0;
        for budget in ledger.budgets.values_mut().filter(|b| b.period == period) {
            budget.spent = 0.0;
            reset += 1;
            tracing::info!(key = %budget.key, user_id = ?budget.user_id, %period, "Budget reset");
        }
        reset
    }

    /// Purge events older than 90 days and alerts older than 30 days.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn sweep_retention(&self, now: DateTime<Utc>) -> RetentionSweep {
        let event_cutoff = now - Duration::days(EVENT_RETENTION_DAYS);
        let alert_cutoff = now - Duration::days(ALERT_RETENTION_DAYS);

        let mut ledger = self.ledger.lock().expect("Mutex poisoned");
        let events_before = ledger.events.len();
        ledger.events.retain(|e| e.timestamp > event_cutoff);
        let alerts_before = ledger.alerts.len();
        ledger.alerts.retain(|a| a.timestamp > alert_cutoff);

        let sweep = RetentionSweep {
            events_removed: events_before - ledger.events.len(),
            alerts_removed: alerts_before - ledger.alerts.len(),
        };
        tracing::debug!(
            events_removed = sweep.events_removed,
            alerts_removed = sweep.alerts_removed,
            "Retention sweep finished"
        );
        sweep
    }

    /// Set every budget limit to zero until restart.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn emergency_stop(&self) {
        let mut ledger = self.ledger.lock().expect("Mutex poisoned");
        for budget in ledger.budgets.values_mut() {
            budget.limit = 0.0;
        }
        ledger.emergency_stopped = true;
        tracing::error!(budgets = ledger.budgets.len(), "Emergency stop activated");
    }

    /// Whether [`CostTracker::emergency_stop`] has been called.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn is_emergency_stopped(&self) -> bool {
        self.ledger.lock().expect("Mutex poisoned").emergency_stopped
    }
}

/// Alert when spend has just entered the 90 % or 70 % band.
///
/// A jump that lands beyond a band raises nothing.
fn crossed_threshold(before: f64, after: f64) -> Option<AlertSeverity> {
    if (90.0..91.0).contains(&after) && before < 90.0 {
        Some(AlertSeverity::Critical)
    } else if (70.0..71.0).contains(&after) && before < 70.0 {
        Some(AlertSeverity::Warning)
    } else {
        None
    }
}

fn new_alert(budget: &Budget, severity: AlertSeverity, pct: f64, event: &CostEvent) -> BudgetAlert {
    let label = match severity {
        AlertSeverity::Warning => "Warning",
        AlertSeverity::Critical => "Critical",
    };
    BudgetAlert {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: event.timestamp,
        user_id: event.user_id.clone(),
        budget_key: budget.key.clone(),
        budget_period: budget.period,
        limit: budget.limit,
        spent: budget.spent,
        severity,
        message: format!(
            "{label}: {pct:.1}% of {} budget {} used",
            budget.period, budget.key
        ),
    }
}

/// Compare the mean of the last three daily costs with the up to three before them.
#[allow(clippy::cast_precision_loss)]
fn analyze_trend(daily_costs: &[f64]) -> Trend {
    if daily_costs.len() < 2 {
        return Trend::Stable;
    }
    let split = daily_costs.len().saturating_sub(3);
    let recent = &daily_costs[split..];
    let earlier = &daily_costs[split.saturating_sub(3)..split];
    if earlier.is_empty() {
        return Trend::Stable;
    }

    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let (recent_avg, earlier_avg) = (mean(recent), mean(earlier));
    if earlier_avg <= 0.0 {
        return if recent_avg > 0.0 {
            Trend::Increasing
        } else {
            Trend::Stable
        };
    }

    let change = (recent_avg - earlier_avg) / earlier_avg * 100.0;
    if change > 10.0 {
        Trend::Increasing
    } else if change < -10.0 {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}
