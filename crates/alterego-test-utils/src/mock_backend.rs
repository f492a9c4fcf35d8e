// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generation backend for deterministic testing.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use alterego_core::{
    AdapterType, AlterEgoError, AssembledPrompt, BackendErrorKind, Generation, GenerationBackend,
    HealthStatus, PluginAdapter, PromptShape, TokenUsage,
};

/// Default text when the response queue is empty.
pub const DEFAULT_RESPONSE: &str = "mock response";

/// A backend that answers from a FIFO queue and records every prompt.
///
/// Delay and failure can be changed mid-test; both apply to every later
/// call until reset.
pub struct MockBackend {
    shape: PromptShape,
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<AssembledPrompt>>,
    delay: Mutex<Duration>,
    failure: Mutex<Option<BackendErrorKind>>,
}

impl MockBackend {
    pub fn new(shape: PromptShape) -> Self {
        Self {
            shape,
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            failure: Mutex::new(None),
        }
    }

    pub fn with_responses(shape: PromptShape, responses: Vec<String>) -> Self {
        let backend = Self::new(shape);
        *lock(&backend.responses) = VecDeque::from(responses);
        backend
    }

    pub fn push_response(&self, text: impl Into<String>) {
        lock(&self.responses).push_back(text.into());
    }

    /// Sleep this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// Fail every call with `kind`, or stop failing with `None`.
    pub fn set_failure(&self, kind: Option<BackendErrorKind>) {
        *lock(&self.failure) = kind;
    }

    /// Every prompt received, in order.
    pub fn prompts(&self) -> Vec<AssembledPrompt> {
        lock(&self.prompts).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockBackend {
    fn name(&self) -> &str {
        "mock-backend"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn prompt_shape(&self) -> PromptShape {
        self.shape
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
        lock(&self.prompts).push(prompt.clone());

        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(kind) = lock(&self.failure).clone() {
            return Err(AlterEgoError::backend(kind, "mock failure"));
        }

        let text = lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| DEFAULT_RESPONSE.to_string());
        Ok(Generation {
            text,
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alterego_core::{ChatMessage, Role};

    fn chat() -> AssembledPrompt {
        AssembledPrompt::Chat {
            messages: vec![ChatMessage::new(Role::User, "hi")],
        }
    }

    #[tokio::test]
    async fn answers_from_queue_then_default() {
        let backend = MockBackend::with_responses(PromptShape::Chat, vec!["first".into()]);
        assert_eq!(backend.generate(&chat()).await.unwrap().text, "first");
        assert_eq!(backend.generate(&chat()).await.unwrap().text, DEFAULT_RESPONSE);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn injected_failure_is_reported() {
        let backend = MockBackend::new(PromptShape::Chat);
        backend.set_failure(Some(BackendErrorKind::Status(500)));
        assert!(backend.generate(&chat()).await.is_err());
        backend.set_failure(None);
        assert!(backend.generate(&chat()).await.is_ok());
    }
}
