// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle and dispatch for one generation backend.
//!
//! A backend that needs a local process moves `Stopped -> Starting -> Ready`
//! on [`BackendOrchestrator::start`] and back to `Stopped` on
//! [`BackendOrchestrator::stop`]. A backend without a process is `Ready` as
//! soon as it is started. Every dispatch runs under a timeout, and a
//! successful warm-up is dispatched at most once per orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strum::Display;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use alterego_config::model::{BackendKind, BackendTimeouts};
use alterego_context::warm_up_prompt;
use alterego_core::{
    AlterEgoError, AssembledPrompt, BackendErrorKind, Generation, GenerationBackend, HealthStatus,
    PromptShape,
};

/// Lifecycle state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendState {
    Stopped,
    Starting,
    Ready,
}

/// Result of a warm-up request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmUp {
    /// The warm-up prompt was dispatched and succeeded.
    Completed,
    /// An earlier warm-up already succeeded; nothing was dispatched.
    AlreadyWarm,
}

/// Point-in-time view for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub kind: BackendKind,
    pub name: String,
    pub state: BackendState,
    pub warm: bool,
    pub health: HealthStatus,
}

/// Owns one [`GenerationBackend`] and its lifecycle.
pub struct BackendOrchestrator {
    kind: BackendKind,
    backend: Arc<dyn GenerationBackend>,
    timeouts: BackendTimeouts,
    state: Mutex<BackendState>,
    /// Serializes start and stop.
    lifecycle: tokio::sync::Mutex<()>,
    warm: OnceCell<()>,
}

impl BackendOrchestrator {
    pub fn new(
        kind: BackendKind,
        backend: Arc<dyn GenerationBackend>,
        timeouts: BackendTimeouts,
    ) -> Self {
        Self {
            kind,
            backend,
            timeouts,
            state: Mutex::new(BackendState::Stopped),
            lifecycle: tokio::sync::Mutex::new(()),
            warm: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn prompt_shape(&self) -> PromptShape {
        self.backend.prompt_shape()
    }

    pub fn timeouts(&self) -> BackendTimeouts {
        self.timeouts
    }

    /// Current state. A `Ready` backend whose process died reads as `Stopped`.
    pub fn state(&self) -> BackendState {
        let mut state = self.lock_state();
        if *state == BackendState::Ready
            && self.backend.requires_process()
            && !self.backend.is_alive()
        {
            warn!(backend = %self.kind, "backend process exited unexpectedly");
            *state = BackendState::Stopped;
        }
        *state
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: BackendState) {
        *self.lock_state() = next;
    }

    pub fn is_warm(&self) -> bool {
        self.warm.initialized()
    }

    /// Ready for callers: started and warmed up once.
    pub fn is_ready(&self) -> bool {
        self.state() == BackendState::Ready && self.is_warm()
    }

    /// Brings the backend to `Ready`.
    ///
    /// Blocks until a local process accepts requests or the startup timeout
    /// elapses. On failure the state returns to `Stopped` and the error is
    /// propagated. Starting a `Ready` backend is a no-op.
    pub async fn start(&self) -> Result<(), AlterEgoError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == BackendState::Ready {
            return Ok(());
        }
        if !self.backend.requires_process() {
            self.set_state(BackendState::Ready);
            debug!(backend = %self.kind, "backend ready (no local process)");
            return Ok(());
        }

        self.set_state(BackendState::Starting);
        let started = Instant::now();
        let startup = self.timeouts.startup;
        let result = match tokio::time::timeout(startup, self.backend.start(startup)).await {
            Ok(result) => result,
            Err(_) => Err(AlterEgoError::Startup {
                message: format!("backend not ready within {}s", startup.as_secs_f32()),
            }),
        };

        match result {
            Ok(()) => {
                self.set_state(BackendState::Ready);
                info!(
                    backend = %self.kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "backend ready"
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(BackendState::Stopped);
                // Reap anything half-started.
                let _ = self.backend.stop(self.timeouts.shutdown).await;
                Err(e)
            }
        }
    }

    /// Starts the backend unless it is already `Ready`.
    pub async fn ensure_started(&self) -> Result<(), AlterEgoError> {
        if self.state() == BackendState::Ready {
            return Ok(());
        }
        self.start().await
    }

    /// Stops the backend. Stopping a `Stopped` backend is a no-op.
    pub async fn stop(&self) -> Result<(), AlterEgoError> {
        let _guard = self.lifecycle.lock().await;
        if *self.lock_state() == BackendState::Stopped {
            return Ok(());
        }
        let result = self.backend.stop(self.timeouts.shutdown).await;
        self.set_state(BackendState::Stopped);
        info!(backend = %self.kind, "backend stopped");
        result
    }

    /// Sends `prompt` and waits at most `timeout` for the response.
    ///
    /// Fails with [`BackendErrorKind::NotReady`] before `start`, and with
    /// [`BackendErrorKind::Timeout`] when the deadline passes. No partial
    /// output is returned on failure.
    pub async fn dispatch(
        &self,
        prompt: &AssembledPrompt,
        timeout: Duration,
    ) -> Result<Generation, AlterEgoError> {
        let state = self.state();
        if state != BackendState::Ready {
            return Err(AlterEgoError::backend(
                BackendErrorKind::NotReady,
                format!("{} backend is {state}", self.kind),
            ));
        }
        if prompt.shape() != self.prompt_shape() {
            return Err(AlterEgoError::InvalidInput(format!(
                "{} backend expects a {} prompt, got {}",
                self.kind,
                self.prompt_shape(),
                prompt.shape()
            )));
        }

        let started = Instant::now();
        let result = tokio::time::timeout(timeout, self.backend.generate(prompt)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(Ok(generation)) => {
                debug!(backend = %self.kind, elapsed_ms, "dispatch complete");
                Ok(generation)
            }
            Ok(Err(e)) => {
                warn!(backend = %self.kind, elapsed_ms, error = %e, "dispatch failed");
                Err(e)
            }
            Err(_) => {
                warn!(backend = %self.kind, elapsed_ms, "dispatch timed out");
                Err(AlterEgoError::backend(
                    BackendErrorKind::Timeout,
                    format!("no response within {}s", timeout.as_secs_f32()),
                ))
            }
        }
    }

    /// Dispatches under the configured query timeout.
    pub async fn query(&self, prompt: &AssembledPrompt) -> Result<Generation, AlterEgoError> {
        self.dispatch(prompt, self.timeouts.query).await
    }

    /// Runs the warm-up prompt once, under the warm-up timeout.
    ///
    /// Concurrent callers wait for the same attempt. After a success, every
    /// later call returns [`WarmUp::AlreadyWarm`] without dispatching. A
    /// failed attempt is not cached.
    pub async fn warm_up(&self, persona_instructions: &str) -> Result<WarmUp, AlterEgoError> {
        if self.is_warm() {
            return Ok(WarmUp::AlreadyWarm);
        }
        self.ensure_started().await?;

        let dispatched = AtomicBool::new(false);
        let dispatched_ref = &dispatched;
        self.warm
            .get_or_try_init(|| async move {
                dispatched_ref.store(true, Ordering::Relaxed);
                let prompt = warm_up_prompt(self.prompt_shape(), persona_instructions);
                self.dispatch(&prompt, self.timeouts.warm_up).await?;
                info!(backend = %self.kind, "backend warmed up");
                Ok::<(), AlterEgoError>(())
            })
            .await?;
        Ok(if dispatched.load(Ordering::Relaxed) {
            WarmUp::Completed
        } else {
            WarmUp::AlreadyWarm
        })
    }

    pub async fn status(&self) -> BackendStatus {
        let health = match self.backend.health_check().await {
            Ok(health) => health,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };
        BackendStatus {
            kind: self.kind,
            name: self.backend.name().to_string(),
            state: self.state(),
            warm: self.is_warm(),
            health,
        }
    }
}
