//! Token accounting and per-model pricing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ModelRates, DEFAULT_RATE_FAMILY};

/// Token counts reported by the backend for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Usage with the total derived from its parts.
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Price table keyed by model family prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRates {
    rates: BTreeMap<String, ModelRates>,
}

impl CostRates {
    #[must_use]
    pub fn new(rates: BTreeMap<String, ModelRates>) -> Self {
        Self { rates }
    }

    /// Rates for a model: the longest matching family prefix wins, then
    /// the `default` family, then zero.
    #[must_use]
    pub fn rates_for(&self, model: &str) -> ModelRates {
        self.rates
            .iter()
            .filter(|(family, _)| family.as_str() != DEFAULT_RATE_FAMILY)
            .filter(|(family, _)| model.starts_with(family.as_str()))
            .max_by_key(|(family, _)| family.len())
            .map(|(_, rates)| *rates)
            .or_else(|| self.rates.get(DEFAULT_RATE_FAMILY).copied())
            .unwrap_or_else(|| {
                tracing::debug!(model, "No cost rates configured for model");
                ModelRates {
                    input: 0.0,
                    output: 0.0,
                }
            })
    }

    /// `prompt/1000 * input + completion/1000 * output`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cost(&self, model: &str, usage: &TokenUsage) -> f64 {
        let rates = self.rates_for(model);
        let input = usage.prompt_tokens as f64 / 1000.0 * rates.input;
        let output = usage.completion_tokens as f64 / 1000.0 * rates.output;
        input + output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;

    fn rates() -> CostRates {
        CostRates::new(PlatformConfig::default().cost_rates)
    }

    #[test]
    fn test_cost_formula() {
        let cost = rates().cost("gpt-4", &TokenUsage::new(1000, 500));
        assert!((cost - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut table = PlatformConfig::default().cost_rates;
        table.insert(
            "gpt-4o".to_string(),
            ModelRates {
                input: 0.005,
                output: 0.015,
            },
        );
        let rates = CostRates::new(table);
        assert!((rates.rates_for("gpt-4o-mini").input - 0.005).abs() < f64::EPSILON);
        assert!((rates.rates_for("gpt-4-turbo").input - 0.03).abs() < f64::EPSILON);
        assert!((rates.rates_for("gpt-3.5-turbo-16k").output - 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_model_uses_default_family() {
        let r = rates().rates_for("mistral-large");
        assert!((r.input - 0.03).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_table_costs_nothing() {
        let rates = CostRates::new(BTreeMap::new());
        assert!(rates.cost("gpt-4", &TokenUsage::new(5000, 5000)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }
}
