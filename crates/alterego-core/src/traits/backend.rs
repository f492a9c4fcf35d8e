// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-generation backend trait (local model server or remote chat API).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AlterEgoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AssembledPrompt, Generation, PromptShape};

/// A service that turns an assembled prompt into generated text.
#[async_trait]
pub trait GenerationBackend: PluginAdapter {
    /// The request layout this backend accepts.
    fn prompt_shape(&self) -> PromptShape;

    /// Whether a local process must be running before dispatch.
    fn requires_process(&self) -> bool;

    /// Launches any local process and waits until it accepts requests.
    async fn start(&self, timeout: Duration) -> Result<(), AlterEgoError>;

    /// Stops any local process. Calling it on a stopped backend is a no-op.
    async fn stop(&self, timeout: Duration) -> Result<(), AlterEgoError>;

    /// Whether the local process (if any) is still running.
    fn is_alive(&self) -> bool;

    /// Produces a response. Callers bound the wait with their own timeout.
    async fn generate(&self, prompt: &AssembledPrompt) -> Result<Generation, AlterEgoError>;
}
