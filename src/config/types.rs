//! Configuration types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Generative backend kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Claude,
    Gemini,
}

impl ProviderKind {
    /// Base URL used when none is configured.
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Claude => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Environment variable holding the API key when none is configured.
    #[must_use]
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Claude => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "claude" | "anthropic" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Configuration for the generative backend client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    /// Provider to use (openai, claude or gemini).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model used when a request does not name one.
    #[serde(default = "default_model")]
    pub model: String,
    /// Default maximum tokens in a response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Base URL for the API. Falls back to the provider default.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable name for the API key. Falls back to the provider default.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Overall timeout for one completion call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            base_url: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    /// Effective base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Effective API key environment variable.
    #[must_use]
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }
}

/// Request quotas applied before every backend call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1000,
        }
    }
}

/// Limits for the budgets created at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BudgetConfig {
    pub daily_limit: f64,
    pub monthly_limit: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit: 10.0,
            monthly_limit: 200.0,
        }
    }
}

/// Price per 1K tokens for one model family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
}

/// Family key used when no configured family matches a model name.
pub const DEFAULT_RATE_FAMILY: &str = "default";

fn default_cost_rates() -> BTreeMap<String, ModelRates> {
    BTreeMap::from([
        (
            "gpt-4".to_string(),
            ModelRates {
                input: 0.03,
                output: 0.06,
            },
        ),
        (
            "gpt-3.5-turbo".to_string(),
            ModelRates {
                input: 0.0015,
                output: 0.002,
            },
        ),
        (
            DEFAULT_RATE_FAMILY.to_string(),
            ModelRates {
                input: 0.03,
                output: 0.06,
            },
        ),
    ])
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Token prices keyed by model family prefix.
    #[serde(default = "default_cost_rates")]
    pub cost_rates: BTreeMap<String, ModelRates>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            budget: BudgetConfig::default(),
            cost_rates: default_cost_rates(),
        }
    }
}
