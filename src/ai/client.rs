//! Rate-limited, cost-metered client for the generative backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{AiConfig, PlatformConfig};

use super::{
    agent_system_prompt, agent_user_prompt, assignment_prompt, task_analysis_prompt, AgentMessage,
    AiError, AiProvider, CandidateAgent, CostRates, Provider, ProviderRequest, RateLimitStatus,
    RateLimiter, TokenUsage, ASSIGNMENT_SYSTEM_PROMPT, DEFAULT_SYSTEM_PROMPT,
    HEALTH_CHECK_SYSTEM_PROMPT, TASK_ANALYSIS_SYSTEM_PROMPT,
};

const AGENT_REPLY_TEMPERATURE: f32 = 0.3;
const AGENT_REPLY_MAX_TOKENS: u32 = 1000;
const ANALYSIS_TEMPERATURE: f32 = 0.2;
const ANALYSIS_MAX_TOKENS: u32 = 800;
const ASSIGNMENT_TEMPERATURE: f32 = 0.1;
const ASSIGNMENT_MAX_TOKENS: u32 = 600;
const HEALTH_CHECK_MAX_TOKENS: u32 = 5;

/// A completion call. Unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub model: Option<String>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Result of a successful completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub cost: f64,
    pub model: String,
}

/// Totals since the client was created plus current quota usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub rate_limit: RateLimitStatus,
}

#[derive(Debug, Default)]
struct Totals {
    requests: u64,
    tokens: u64,
    cost: f64,
}

/// Client wrapping one provider with quotas and cost metering.
pub struct AiClient {
    provider: Arc<dyn AiProvider>,
    config: AiConfig,
    limiter: RateLimiter,
    rates: CostRates,
    totals: Mutex<Totals>,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .field("rates", &self.rates)
            .finish_non_exhaustive()
    }
}

impl AiClient {
    /// Create a client around an existing provider.
    #[must_use]
    pub fn new(provider: Arc<dyn AiProvider>, config: &PlatformConfig) -> Self {
        Self {
            provider,
            config: config.ai.clone(),
            limiter: RateLimiter::new(config.rate_limit),
            rates: CostRates::new(config.cost_rates.clone()),
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Create a client for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns `AiError::MissingApiKey` if the API key environment variable is not set.
    pub fn from_config(config: &PlatformConfig) -> Result<Self, AiError> {
        let provider = Provider::from_config(&config.ai)?;
        tracing::debug!(
            provider = ?provider.kind(),
            model = %config.ai.model,
            "Generative backend client configured"
        );
        Ok(Self::new(Arc::new(provider), config))
    }

    /// Backend settings in effect.
    #[must_use]
    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Issue one completion call.
    ///
    /// # Errors
    ///
    /// Returns `AiError::RateLimited` before any network I/O if a quota window
    /// is exhausted, `AiError::Timeout` if the call exceeds the configured
    /// timeout, or the provider's error otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion, AiError> {
        self.limiter.try_acquire().inspect_err(|e| {
            tracing::warn!(error = %e, "Completion rejected by rate limiter");
        })?;

        let model = request.model.unwrap_or_else(|| self.config.model.clone());
        let provider_request = ProviderRequest {
            system: request
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            prompt: request.prompt,
            model: model.clone(),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let reply = match tokio::time::timeout(timeout, self.provider.complete(&provider_request))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(error = %e, model = %model, "Backend completion failed");
                return Err(e);
            }
            Err(_) => {
                tracing::error!(model = %model, timeout_secs = self.config.timeout_secs, "Backend completion timed out");
                return Err(AiError::Timeout);
            }
        };

        let cost = self.rates.cost(&model, &reply.usage);
        {
            let mut totals = self.totals.lock().expect("Mutex poisoned");
            totals.requests += 1;
            totals.tokens += reply.usage.total_tokens;
            totals.cost += cost;
        }

        tracing::info!(
            model = %model,
            tokens = reply.usage.total_tokens,
            cost,
            "Response generated"
        );

        Ok(Completion {
            text: reply.text,
            usage: reply.usage,
            cost,
            model,
        })
    }

    /// Probe the backend with a fixed prompt. Counts against the quotas.
    pub async fn health_check(&self) -> bool {
        let request = CompletionRequest::new("test")
            .with_system_prompt(HEALTH_CHECK_SYSTEM_PROMPT)
            .with_max_tokens(HEALTH_CHECK_MAX_TOKENS);
        match self.complete(request).await {
            Ok(completion) => completion.text.trim() == "OK",
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Generate a reply in the voice of an AI agent.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`AiClient::complete`].
    pub async fn agent_reply(&self, message: &AgentMessage) -> Result<Completion, AiError> {
        let request = CompletionRequest::new(agent_user_prompt(message))
            .with_system_prompt(agent_system_prompt(
                &message.agent_id,
                message.task_id.as_deref(),
            ))
            .with_temperature(AGENT_REPLY_TEMPERATURE)
            .with_max_tokens(AGENT_REPLY_MAX_TOKENS);
        self.complete(request).await
    }

    /// Ask for a six-section analysis of a task.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`AiClient::complete`].
    pub async fn analyze_task(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Completion, AiError> {
        let request = CompletionRequest::new(task_analysis_prompt(title, description))
            .with_system_prompt(TASK_ANALYSIS_SYSTEM_PROMPT)
            .with_temperature(ANALYSIS_TEMPERATURE)
            .with_max_tokens(ANALYSIS_MAX_TOKENS);
        self.complete(request).await
    }

    /// Ask which candidate should take a task.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`AiClient::complete`].
    pub async fn suggest_assignment(
        &self,
        description: &str,
        candidates: &[CandidateAgent],
    ) -> Result<Completion, AiError> {
        let request = CompletionRequest::new(assignment_prompt(description, candidates))
            .with_system_prompt(ASSIGNMENT_SYSTEM_PROMPT)
            .with_temperature(ASSIGNMENT_TEMPERATURE)
            .with_max_tokens(ASSIGNMENT_MAX_TOKENS);
        self.complete(request).await
    }

    /// Totals since creation and current quota usage.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn usage_stats(&self) -> UsageStats {
        let totals = self.totals.lock().expect("Mutex poisoned");
        UsageStats {
            total_requests: totals.requests,
            total_tokens: totals.tokens,
            total_cost: totals.cost,
            rate_limit: self.limiter.status(),
        }
    }
}
