// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local backend driven through the Ollama CLI.
//!
//! Each query runs `ollama run <model>` once with the prompt on stdin. The
//! system text is baked into a model through a rendered `Modelfile`. Each
//! distinct Modelfile gets its own model tag, so `ollama create` runs once
//! per persona system text rather than on every switch between personas.
//! With `manage_server` set, `ollama serve` is owned by a [`ManagedProcess`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use alterego_config::model::LocalBackendConfig;
use alterego_context::flatten;
use alterego_core::{
    AdapterType, AlterEgoError, AssembledPrompt, BackendErrorKind, Generation, GenerationBackend,
    HealthStatus, PluginAdapter, PromptShape,
};

use crate::process::ManagedProcess;

/// File name of the rendered model definition inside the work directory.
pub const MODELFILE_NAME: &str = "Modelfile";

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Renders the Modelfile for `system` text.
pub fn render_modelfile(config: &LocalBackendConfig, system: &str) -> String {
    // A literal `"""` would close the SYSTEM block early.
    let system = flatten(system).replace("\"\"\"", "\"");
    format!(
        "FROM {}\nPARAMETER temperature {}\nPARAMETER num_ctx {}\nSYSTEM \"\"\"{}\"\"\"\n",
        config.base_model, config.temperature, config.num_ctx, system
    )
}

fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Hex digits of the Modelfile digest carried in a model tag.
const TAG_DIGEST_LEN: usize = 12;

/// Drops ANSI escape sequences and spinner glyphs the CLI may write to
/// stderr, returning what is left.
pub fn meaningful_stderr(stderr: &str) -> String {
    let mut out = String::new();
    let mut chars = stderr.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // CSI: parameters until a final byte in '@'..='~'.
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            continue;
        }
        if ('\u{2800}'..='\u{28ff}').contains(&c) || c.is_control() {
            continue;
        }
        out.push(c);
    }
    out.trim().to_string()
}

/// Ollama-backed local generation.
pub struct OllamaBackend {
    config: LocalBackendConfig,
    work_dir: PathBuf,
    http: reqwest::Client,
    server: Option<ManagedProcess>,
    /// Set when `start` found a server it does not own.
    external_server: AtomicBool,
    /// Model tags created so far. Held across write-then-create so two
    /// system texts never share the Modelfile at once.
    created: Mutex<HashSet<String>>,
}

impl OllamaBackend {
    /// `work_dir` receives the rendered Modelfile.
    pub fn new(config: LocalBackendConfig, work_dir: impl Into<PathBuf>) -> Self {
        let server = config
            .manage_server
            .then(|| ManagedProcess::new(config.executable.clone(), ["serve"]));
        Self {
            config,
            work_dir: work_dir.into(),
            http: reqwest::Client::new(),
            server,
            external_server: AtomicBool::new(false),
            created: Mutex::new(HashSet::new()),
        }
    }

    pub fn modelfile_path(&self) -> PathBuf {
        self.work_dir.join(MODELFILE_NAME)
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Tag of the model built for `system`: the configured name plus a
    /// digest of the rendered Modelfile.
    pub fn model_tag(&self, system: &str) -> String {
        tag_for(&self.config.model_name, &render_modelfile(&self.config, system))
    }

    /// Whether the server answers `GET /api/version`.
    pub async fn probe(&self) -> bool {
        server_answers(&self.http, &self.config.server_url).await
    }

    async fn wait_for_server(&self, timeout: Duration) -> Result<(), AlterEgoError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.probe().await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AlterEgoError::Startup {
                    message: format!(
                        "no Ollama server answering at {} within {}s",
                        self.config.server_url,
                        timeout.as_secs_f32()
                    ),
                });
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    /// Returns the model tag for `system`, writing the Modelfile and
    /// running `ollama create` the first time that tag is needed.
    async fn ensure_model(&self, system: &str) -> Result<String, AlterEgoError> {
        let modelfile = render_modelfile(&self.config, system);
        let tag = tag_for(&self.config.model_name, &modelfile);
        let mut created = self.created.lock().await;
        if created.contains(&tag) {
            return Ok(tag);
        }

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(AlterEgoError::storage)?;
        let path = self.modelfile_path();
        tokio::fs::write(&path, modelfile.as_bytes())
            .await
            .map_err(AlterEgoError::storage)?;

        let started = Instant::now();
        let path_arg = path.to_string_lossy();
        self.run_cli(&["create", tag.as_str(), "-f", path_arg.as_ref()], None)
            .await?;
        info!(
            model = %tag,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local model created"
        );
        created.insert(tag.clone());
        Ok(tag)
    }

    /// Runs the CLI and returns its stdout.
    ///
    /// `create` reports progress on stderr, so the stderr check only
    /// applies when `stdin` is given (the `run` call).
    async fn run_cli(&self, args: &[&str], stdin: Option<&str>) -> Result<String, AlterEgoError> {
        let mut child = Command::new(&self.config.executable)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AlterEgoError::backend(
                    BackendErrorKind::Transport,
                    format!("failed to run `{}`: {e}", self.config.executable),
                )
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await.map_err(|e| {
                AlterEgoError::backend(
                    BackendErrorKind::Transport,
                    format!("failed to write prompt: {e}"),
                )
            })?;
            // Dropping the pipe closes stdin so the CLI sees end of input.
        }

        let output = child.wait_with_output().await.map_err(|e| {
            AlterEgoError::backend(
                BackendErrorKind::Transport,
                format!("failed to collect output: {e}"),
            )
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let command = args.first().copied().unwrap_or_default();

        if !output.status.success() {
            return Err(AlterEgoError::backend(
                BackendErrorKind::ProcessExit(output.status.code()),
                format!("`{command}` failed: {}", meaningful_stderr(&stderr)),
            ));
        }
        if stdin.is_some() {
            let noise = meaningful_stderr(&stderr);
            if !noise.is_empty() {
                return Err(AlterEgoError::backend(
                    BackendErrorKind::ProcessStderr,
                    format!("`{command}` wrote to stderr: {noise}"),
                ));
            }
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn tag_for(model_name: &str, modelfile: &str) -> String {
    let hash = digest(modelfile);
    format!("{model_name}-{}", &hash[..TAG_DIGEST_LEN])
}

async fn server_answers(http: &reqwest::Client, server_url: &str) -> bool {
    let url = format!("{}/api/version", server_url.trim_end_matches('/'));
    match http.get(&url).timeout(PROBE_TIMEOUT).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[async_trait]
impl PluginAdapter for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        if self.probe().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!(
                "server not answering at {}",
                self.config.server_url
            )))
        }
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        self.stop(self.config.timeouts().shutdown).await
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn prompt_shape(&self) -> PromptShape {
        PromptShape::Completion
    }

    fn requires_process(&self) -> bool {
        true
    }

    async fn start(&self, timeout: Duration) -> Result<(), AlterEgoError> {
        match &self.server {
            Some(server) => {
                // Reuse a server someone else already started.
                if self.probe().await {
                    info!(url = %self.config.server_url, "Ollama server already running");
                    self.external_server.store(true, Ordering::Relaxed);
                    return Ok(());
                }
                self.external_server.store(false, Ordering::Relaxed);
                let http = self.http.clone();
                let url = self.config.server_url.clone();
                server
                    .start(timeout, move || {
                        let http = http.clone();
                        let url = url.clone();
                        async move { server_answers(&http, &url).await }
                    })
                    .await
            }
            None => self.wait_for_server(timeout).await,
        }
    }

    async fn stop(&self, timeout: Duration) -> Result<(), AlterEgoError> {
        match &self.server {
            Some(server) => server.stop(timeout).await,
            None => Ok(()),
        }
    }

    fn is_alive(&self) -> bool {
        match &self.server {
            Some(server) => self.external_server.load(Ordering::Relaxed) || server.is_alive(),
            None => true,
        }
    }

    async fn generate(&self, prompt: &AssembledPrompt) -> Result<Generation, AlterEgoError> {
        let AssembledPrompt::Completion { system, prompt } = prompt else {
            return Err(AlterEgoError::InvalidInput(
                "the local backend accepts completion prompts only".into(),
            ));
        };

        let tag = self.ensure_model(system).await?;

        let started = Instant::now();
        let stdout = self.run_cli(&["run", tag.as_str()], Some(prompt)).await?;
        debug!(
            model = %tag,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local generation complete"
        );
        Ok(Generation {
            text: stdout.trim().to_string(),
            usage: None,
        })
    }
}

/// Work directory for local backend files under `data_dir`.
pub fn default_work_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("ollama")
}
