//! Cost ledger types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::TokenUsage;

/// What a billable call was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Chat,
    AgentCommunication,
    TaskAnalysis,
    AgentSuggestion,
    Other,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chat => "chat",
            Self::AgentCommunication => "agent_communication",
            Self::TaskAnalysis => "task_analysis",
            Self::AgentSuggestion => "agent_suggestion",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A billable call to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCostEvent {
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub task_id: Option<String>,
    pub request_type: RequestType,
    pub model: String,
    pub usage: TokenUsage,
    pub cost: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NewCostEvent {
    #[must_use]
    pub fn new(request_type: RequestType, model: impl Into<String>, usage: TokenUsage, cost: f64) -> Self {
        Self {
            user_id: None,
            agent_id: None,
            task_id: None,
            request_type,
            model: model.into(),
            usage,
            cost,
            metadata: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    #[must_use]
    pub fn with_task(mut self, task_id: Option<String>) -> Self {
        self.task_id = task_id;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A recorded billable call. Immutable once tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub task_id: Option<String>,
    pub request_type: RequestType,
    pub model: String,
    pub usage: TokenUsage,
    pub cost: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate for one breakdown bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub cost: f64,
    pub tokens: u64,
    pub requests: u64,
}

impl Breakdown {
    pub(crate) fn add(&mut self, event: &CostEvent) {
        self.cost += event.cost;
        self.tokens += event.usage.total_tokens;
        self.requests += 1;
    }
}

/// Selects events for a summary. Unset bounds default to the last 30 days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub task_id: Option<String>,
}

impl CostFilter {
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    pub(crate) fn matches(&self, event: &CostEvent) -> bool {
        fn scoped(wanted: Option<&String>, actual: Option<&String>) -> bool {
            match wanted {
                None => true,
                Some(w) => actual == Some(w),
            }
        }
        scoped(self.user_id.as_ref(), event.user_id.as_ref())
            && scoped(self.agent_id.as_ref(), event.agent_id.as_ref())
            && scoped(self.task_id.as_ref(), event.task_id.as_ref())
    }
}

/// Aggregated spend over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_requests: u64,
    pub by_model: BTreeMap<String, Breakdown>,
    pub by_request_type: BTreeMap<RequestType, Breakdown>,
    /// Keyed by UTC date, `YYYY-MM-DD`.
    pub by_day: BTreeMap<String, Breakdown>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Reset cadence of a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Monthly,
    /// Never reset automatically.
    Project,
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Monthly => f.write_str("monthly"),
            Self::Project => f.write_str("project"),
        }
    }
}

/// A spend ceiling, global or scoped to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub key: String,
    pub user_id: Option<String>,
    pub limit: f64,
    pub spent: f64,
    pub period: BudgetPeriod,
}

impl Budget {
    /// Whether spend by `user_id` counts against this budget.
    #[must_use]
    pub fn applies_to(&self, user_id: Option<&str>) -> bool {
        match &self.user_id {
            None => true,
            Some(owner) => user_id == Some(owner.as_str()),
        }
    }

    /// `spent * 100 / limit`; a non-positive limit reads as fully used.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        percentage(self.spent, self.limit)
    }
}

fn percentage(spent: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        100.0
    } else {
        spent * 100.0 / limit
    }
}

/// Health band of a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetHealth {
    Healthy,
    Warning,
    Critical,
}

impl BudgetHealth {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Critical
        } else if percentage >= 70.0 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }
}

/// Point-in-time view of a budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatus {
    pub limit: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percentage: f64,
    pub period: BudgetPeriod,
    pub status: BudgetHealth,
}

impl From<&Budget> for BudgetStatus {
    fn from(budget: &Budget) -> Self {
        let percentage = budget.percentage();
        Self {
            limit: budget.limit,
            spent: budget.spent,
            remaining: budget.limit - budget.spent,
            percentage,
            period: budget.period,
            status: BudgetHealth::from_percentage(percentage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// Raised when a budget crosses 70 % or 90 %.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// User whose spend triggered the alert.
    pub user_id: Option<String>,
    pub budget_key: String,
    pub budget_period: BudgetPeriod,
    pub limit: f64,
    pub spent: f64,
    pub severity: AlertSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seasonality {
    None,
    Detected,
}

/// Projection of spend from the last seven days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostForecast {
    pub projected_cost: f64,
    pub projected_tokens: f64,
    pub confidence: ForecastConfidence,
    pub daily_average: f64,
    pub trend: Trend,
    pub seasonality: Seasonality,
}
