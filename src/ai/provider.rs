//! HTTP providers for the generative backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::{AiConfig, ProviderKind};

use super::{AiError, TokenUsage};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build an HTTP client with proper timeout configuration.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialised.
fn build_http_client(request_timeout: Duration) -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .expect("Failed to build HTTP client")
}

/// One fully-resolved completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub system: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw provider output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Trait for generative backends.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Issue one completion call.
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, AiError>;
}

/// Send a JSON request and decode a JSON response, mapping transport failures.
async fn send_json(request: RequestBuilder) -> Result<Value, AiError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            AiError::Timeout
        } else {
            AiError::Backend(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(AiError::Backend(format!("HTTP {status}: {text}")));
    }

    response
        .json()
        .await
        .map_err(|e| AiError::ParseError(e.to_string()))
}

fn token_count(value: &Value) -> u64 {
    value.as_u64().unwrap_or(0)
}

/// OpenAI chat-completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider.
    #[must_use]
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            client: build_http_client(timeout),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, AiError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        let json = send_json(
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        // A null or absent message content is an empty reply, not an error.
        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let usage = &json["usage"];
        Ok(ProviderReply {
            text,
            usage: TokenUsage {
                prompt_tokens: token_count(&usage["prompt_tokens"]),
                completion_tokens: token_count(&usage["completion_tokens"]),
                total_tokens: token_count(&usage["total_tokens"]),
            },
        })
    }
}

/// Claude API provider.
#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ClaudeProvider {
    /// Create a new Claude provider.
    #[must_use]
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            client: build_http_client(timeout),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl AiProvider for ClaudeProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, AiError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [{
                "role": "user",
                "content": request.prompt
            }]
        });

        let json = send_json(
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body),
        )
        .await?;

        let text = json["content"][0]["text"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AiError::ParseError("No text in Claude response".to_string()))?;
        let usage = &json["usage"];
        Ok(ProviderReply {
            text,
            usage: TokenUsage::new(
                token_count(&usage["input_tokens"]),
                token_count(&usage["output_tokens"]),
            ),
        })
    }
}

/// Gemini API provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    #[must_use]
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            client: build_http_client(timeout),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, AiError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            request.model
        );
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "systemInstruction": {
                "parts": [{ "text": request.system }]
            },
            "generationConfig": {
                "maxOutputTokens": request.max_tokens,
                "temperature": request.temperature
            }
        });

        let json = send_json(
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        let text = json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AiError::ParseError("No text in Gemini response".to_string()))?;
        let usage = &json["usageMetadata"];
        Ok(ProviderReply {
            text,
            usage: TokenUsage {
                prompt_tokens: token_count(&usage["promptTokenCount"]),
                completion_tokens: token_count(&usage["candidatesTokenCount"]),
                total_tokens: token_count(&usage["totalTokenCount"]),
            },
        })
    }
}

/// Provider enum for dispatch.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(OpenAiProvider),
    Claude(ClaudeProvider),
    Gemini(GeminiProvider),
}

impl Provider {
    /// Build the configured provider, reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AiError::MissingApiKey` if the key variable is not set.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let key_env = config.api_key_env();
        let api_key =
            std::env::var(key_env).map_err(|_| AiError::MissingApiKey(key_env.to_string()))?;
        let base_url = config.base_url().to_string();
        let timeout = Duration::from_secs(config.timeout_secs);

        Ok(match config.provider {
            ProviderKind::OpenAi => Self::OpenAi(OpenAiProvider::new(base_url, api_key, timeout)),
            ProviderKind::Claude => Self::Claude(ClaudeProvider::new(base_url, api_key, timeout)),
            ProviderKind::Gemini => Self::Gemini(GeminiProvider::new(base_url, api_key, timeout)),
        })
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Claude(_) => ProviderKind::Claude,
            Self::Gemini(_) => ProviderKind::Gemini,
        }
    }
}

#[async_trait]
impl AiProvider for Provider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, AiError> {
        match self {
            Self::OpenAi(p) => p.complete(request).await,
            Self::Claude(p) => p.complete(request).await,
            Self::Gemini(p) => p.complete(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProviderRequest {
        ProviderRequest {
            system: "be brief".to_string(),
            prompt: "hello".to_string(),
            model: "test-model".to_string(),
            temperature: 0.3,
            max_tokens: 50,
        }
    }

    #[tokio::test]
    async fn test_openai_parses_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"OK"}}],
                    "usage":{"prompt_tokens":10,"completion_tokens":2,"total_tokens":12}}"#,
            )
            .create_async()
            .await;

        let provider =
            OpenAiProvider::new(server.url(), "sk-test".to_string(), Duration::from_secs(5));
        let reply = provider.complete(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.text, "OK");
        assert_eq!(reply.usage, TokenUsage::new(10, 2));
    }

    #[tokio::test]
    async fn test_openai_http_error_is_backend_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let provider = OpenAiProvider::new(server.url(), "k".to_string(), Duration::from_secs(5));
        let err = provider.complete(&request()).await.unwrap_err();
        match err {
            AiError::Backend(detail) => {
                assert!(detail.contains("503"));
                assert!(detail.contains("overloaded"));
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claude_parses_usage() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "ck")
            .with_status(200)
            .with_body(
                r#"{"content":[{"type":"text","text":"Hi"}],
                    "usage":{"input_tokens":7,"output_tokens":3}}"#,
            )
            .create_async()
            .await;

        let provider = ClaudeProvider::new(server.url(), "ck".to_string(), Duration::from_secs(5));
        let reply = provider.complete(&request()).await.unwrap();
        assert_eq!(reply.text, "Hi");
        assert_eq!(reply.usage.total_tokens, 10);
    }

    #[tokio::test]
    async fn test_gemini_missing_text_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/test-model:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new(server.url(), "gk".to_string(), Duration::from_secs(5));
        let err = provider.complete(&request()).await.unwrap_err();
        assert!(matches!(err, AiError::ParseError(_)));
    }

    #[test]
    fn test_from_config_missing_key() {
        let config = AiConfig {
            api_key_env: Some("COLLAB_TEST_UNSET_KEY".to_string()),
            ..AiConfig::default()
        };
        let err = Provider::from_config(&config).unwrap_err();
        assert!(matches!(err, AiError::MissingApiKey(ref k) if k == "COLLAB_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_from_config_claude() {
        std::env::set_var("COLLAB_TEST_CLAUDE_KEY", "test-key");
        let config = AiConfig {
            provider: ProviderKind::Claude,
            api_key_env: Some("COLLAB_TEST_CLAUDE_KEY".to_string()),
            ..AiConfig::default()
        };
        let provider = Provider::from_config(&config).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Claude);
        std::env::remove_var("COLLAB_TEST_CLAUDE_KEY");
    }
}
