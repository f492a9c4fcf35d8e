// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-generation backends for Alter Ego.
//!
//! Two implementations sit behind [`alterego_core::GenerationBackend`]: a
//! local Ollama model driven through its CLI ([`OllamaBackend`]) and a remote
//! OpenAI-compatible chat API ([`OpenAiBackend`]). Each is wrapped in a
//! [`BackendOrchestrator`] that owns its lifecycle, timeouts and warm-up.

pub mod ollama;
pub mod openai;
pub mod orchestrator;
pub mod process;
pub mod types;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use alterego_config::model::{BackendConfig, BackendKind};

pub use ollama::{OllamaBackend, render_modelfile};
pub use openai::{OpenAiBackend, OpenAiClient};
pub use orchestrator::{BackendOrchestrator, BackendState, BackendStatus, WarmUp};
pub use process::ManagedProcess;

/// Builds one orchestrator per configured backend.
///
/// Backends are constructed but not started. A remote backend without
/// credentials is still returned, disabled, so selecting it yields a
/// structured error instead of a missing entry.
pub fn build_orchestrators(
    config: &BackendConfig,
    data_dir: &Path,
) -> HashMap<BackendKind, Arc<BackendOrchestrator>> {
    let local = OllamaBackend::new(config.local.clone(), ollama::default_work_dir(data_dir));
    let remote = OpenAiBackend::new(&config.remote);

    HashMap::from([
        (
            BackendKind::Local,
            Arc::new(BackendOrchestrator::new(
                BackendKind::Local,
                Arc::new(local),
                config.local.timeouts(),
            )),
        ),
        (
            BackendKind::Remote,
            Arc::new(BackendOrchestrator::new(
                BackendKind::Remote,
                Arc::new(remote),
                config.remote.timeouts(),
            )),
        ),
    ])
}
