// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote backend for OpenAI-compatible chat-completion APIs.
//!
//! [`OpenAiClient`] owns the HTTP details: bearer authentication, retry of
//! transient statuses, and classification of every failure into a
//! [`BackendErrorKind`]. [`OpenAiBackend`] adapts it to [`GenerationBackend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use alterego_config::model::RemoteBackendConfig;
use alterego_core::{
    AdapterType, AlterEgoError, AssembledPrompt, BackendErrorKind, Generation, GenerationBackend,
    HealthStatus, PluginAdapter, PromptShape, Role, TokenUsage,
};

use crate::types::{ApiErrorResponse, ApiMessage, ChatCompletionRequest, ChatCompletionResponse};

/// Environment variable consulted when the config carries no key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// HTTP client for one chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl OpenAiClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(api_key: &str, base_url: &str, max_retries: u32) -> Result<Self, AlterEgoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| AlterEgoError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AlterEgoError::backend(
                    BackendErrorKind::Transport,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Overrides the pause between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one completion request.
    ///
    /// Retries 429/500/502/503 up to `max_retries` times. The caller bounds
    /// the total wait.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AlterEgoError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                warn!(attempt, "retrying chat completion after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(request)
                .send()
                .await
                .map_err(classify_transport)?;

            let status = response.status();
            debug!(status = %status, attempt, "chat completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(classify_transport)?;
                return serde_json::from_str(&body).map_err(|e| {
                    AlterEgoError::backend(
                        BackendErrorKind::MalformedResponse,
                        format!("failed to parse API response: {e}"),
                    )
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_status(status) && attempt < self.max_retries {
                warn!(status = %status, "transient error, will retry");
                attempt += 1;
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => match api_err.error.type_ {
                    Some(type_) => format!("API error ({type_}): {}", api_err.error.message),
                    None => format!("API error: {}", api_err.error.message),
                },
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(AlterEgoError::backend(
                BackendErrorKind::Status(status.as_u16()),
                message,
            ));
        }
    }
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

fn classify_transport(e: reqwest::Error) -> AlterEgoError {
    let kind = if e.is_timeout() {
        BackendErrorKind::Timeout
    } else {
        BackendErrorKind::Transport
    };
    AlterEgoError::backend(kind, format!("HTTP request failed: {e}"))
}

/// Resolves the API key: a non-empty config value wins, then the environment.
pub fn resolve_api_key(config_key: Option<&str>, env_key: Option<String>) -> Option<String> {
    config_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| env_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()))
}

/// Converts an assembled prompt into API messages.
///
/// A completion-shaped prompt becomes a system message plus one user message.
pub fn to_api_messages(prompt: &AssembledPrompt) -> Vec<ApiMessage> {
    match prompt {
        AssembledPrompt::Chat { messages } => messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect(),
        AssembledPrompt::Completion { system, prompt } => vec![
            ApiMessage {
                role: Role::System.to_string(),
                content: system.clone(),
            },
            ApiMessage {
                role: Role::User.to_string(),
                content: prompt.clone(),
            },
        ],
    }
}

/// Chat-completion backend. Has no local process, so it is ready as soon
/// as it is constructed.
///
/// A missing API key disables the backend instead of failing construction;
/// every dispatch then reports [`BackendErrorKind::Disabled`].
pub struct OpenAiBackend {
    client: Option<OpenAiClient>,
    disabled_reason: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiBackend {
    /// Builds the backend, reading [`API_KEY_ENV`] when the config has no key.
    pub fn new(config: &RemoteBackendConfig) -> Self {
        let key = resolve_api_key(config.api_key.as_deref(), std::env::var(API_KEY_ENV).ok());
        Self::with_key(config, key)
    }

    /// Builds the backend with an explicit key resolution result.
    pub fn with_key(config: &RemoteBackendConfig, api_key: Option<String>) -> Self {
        let (client, disabled_reason) = match api_key {
            None => {
                let reason = format!(
                    "no API key: set backend.remote.api_key or the {API_KEY_ENV} environment variable"
                );
                warn!(reason = %reason, "remote backend disabled");
                (None, Some(reason))
            }
            Some(key) => match OpenAiClient::new(&key, &config.base_url, config.max_retries) {
                Ok(client) => {
                    info!(model = %config.model, endpoint = %client.endpoint(), "remote backend initialized");
                    (Some(client), None)
                }
                Err(e) => {
                    warn!(error = %e, "remote backend disabled");
                    (None, Some(e.to_string()))
                }
            },
        };

        Self {
            client,
            disabled_reason,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Replaces the client's retry pause.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.client = self.client.map(|c| c.with_retry_delay(delay));
        self
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled_reason.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_request(&self, prompt: &AssembledPrompt) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: to_api_messages(prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        // No request is made: a probe would spend tokens.
        Ok(match &self.disabled_reason {
            Some(reason) => HealthStatus::Unhealthy(reason.clone()),
            None => HealthStatus::Healthy,
        })
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        debug!("remote backend shutting down");
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn prompt_shape(&self) -> PromptShape {
        PromptShape::Chat
    }

    fn requires_process(&self) -> bool {
        false
    }

    async fn start(&self, _timeout: Duration) -> Result<(), AlterEgoError> {
        Ok(())
    }

    async fn stop(&self, _timeout: Duration) -> Result<(), AlterEgoError> {
        Ok(())
    }

    fn is_alive(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &AssembledPrompt) -> Result<Generation, AlterEgoError> {
        let Some(client) = &self.client else {
            return Err(AlterEgoError::backend(
                BackendErrorKind::Disabled,
                self.disabled_reason.clone().unwrap_or_default(),
            ));
        };

        let response = client.complete(&self.to_request(prompt)).await?;
        let text = response.first_text().ok_or_else(|| {
            AlterEgoError::backend(
                BackendErrorKind::MalformedResponse,
                "response contained no message content",
            )
        })?;

        Ok(Generation {
            text: text.trim().to_string(),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alterego_core::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> RemoteBackendConfig {
        RemoteBackendConfig {
            base_url: base_url.to_string(),
            model: "test-model".into(),
            max_retries: 1,
            ..RemoteBackendConfig::default()
        }
    }

    fn backend(server: &MockServer) -> OpenAiBackend {
        OpenAiBackend::with_key(&config(&server.uri()), Some("sk-test".into()))
            .with_retry_delay(Duration::from_millis(10))
    }

    fn chat(query: &str) -> AssembledPrompt {
        AssembledPrompt::Chat {
            messages: vec![
                ChatMessage::new(Role::System, "be brief"),
                ChatMessage::new(Role::User, query),
            ],
        }
    }

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "model": "test-model",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })
    }

    #[test]
    fn api_key_prefers_config_then_env() {
        assert_eq!(
            resolve_api_key(Some("sk-config"), Some("sk-env".into())).as_deref(),
            Some("sk-config")
        );
        assert_eq!(
            resolve_api_key(Some("  "), Some("sk-env".into())).as_deref(),
            Some("sk-env")
        );
        assert_eq!(resolve_api_key(None, None), None);
        assert_eq!(resolve_api_key(None, Some(String::new())), None);
    }

    #[test]
    fn completion_prompt_maps_to_system_and_user() {
        let prompt = AssembledPrompt::Completion {
            system: "sys".into(),
            prompt: "User: hi\nAssistant:".into(),
        };
        let messages = to_api_messages(&prompt);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[tokio::test]
    async fn generate_returns_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "messages": [{"role": "system", "content": "be brief"}, {"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body(" Hi there! ")))
            .mount(&server)
            .await;

        let generation = backend(&server).generate(&chat("hello")).await.unwrap();
        assert_eq!(generation.text, "Hi there!");
        assert_eq!(
            generation.usage,
            Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 3
            })
        );
    }

    #[tokio::test]
    async fn retries_once_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "slow down", "type": "rate_limit_error"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("after retry")))
            .mount(&server)
            .await;

        let generation = backend(&server).generate(&chat("hello")).await.unwrap();
        assert_eq!(generation.text, "after retry");
    }

    #[tokio::test]
    async fn exhausted_retries_report_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let err = backend(&server).generate(&chat("hello")).await.unwrap_err();
        assert!(
            matches!(
                err,
                AlterEgoError::Backend {
                    kind: BackendErrorKind::Status(503),
                    ..
                }
            ),
            "got {err}"
        );
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = backend(&server).generate(&chat("hello")).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("invalid_request_error"), "got {text}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn malformed_body_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = backend(&server).generate(&chat("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            AlterEgoError::Backend {
                kind: BackendErrorKind::MalformedResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = backend(&server).generate(&chat("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            AlterEgoError::Backend {
                kind: BackendErrorKind::MalformedResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        // Port 9 (discard) is closed on test hosts.
        let backend = OpenAiBackend::with_key(&config("http://127.0.0.1:9"), Some("k".into()));
        let err = backend.generate(&chat("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            AlterEgoError::Backend {
                kind: BackendErrorKind::Transport,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_key_disables_backend() {
        let backend = OpenAiBackend::with_key(&config("http://127.0.0.1:9"), None);
        assert!(backend.disabled_reason().unwrap().contains(API_KEY_ENV));
        assert!(matches!(
            backend.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        let err = backend.generate(&chat("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            AlterEgoError::Backend {
                kind: BackendErrorKind::Disabled,
                ..
            }
        ));
    }

    #[test]
    fn adapter_metadata() {
        let backend = OpenAiBackend::with_key(&RemoteBackendConfig::default(), Some("k".into()));
        assert_eq!(backend.name(), "openai");
        assert_eq!(backend.adapter_type(), AdapterType::Backend);
        assert_eq!(backend.prompt_shape(), PromptShape::Chat);
        assert!(!backend.requires_process());
    }
}
