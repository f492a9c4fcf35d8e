// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Alter Ego.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use alterego_core::RelevanceFilter;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlterEgoConfig {
    /// Identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Database and per-persona file locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Short-term buffer and retrieval settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Prompt assembly settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// Text-generation backend selection and tuning.
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Agent identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Persona used by the CLI when `--persona` is omitted.
    #[serde(default = "default_persona")]
    pub default_persona: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            default_persona: default_persona(),
        }
    }
}

fn default_agent_name() -> String {
    "alterego".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_persona() -> String {
    "ALTER EGO".to_string()
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file shared by all personas.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory holding per-persona files (transcript export, flat index, model cache).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Mirror each persona's transcript to `chat_history.json` for external readers.
    #[serde(default = "default_true")]
    pub export_transcript_json: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            data_dir: default_data_dir(),
            wal_mode: true,
            export_transcript_json: true,
        }
    }
}

impl StorageConfig {
    pub fn data_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("alterego").join("alterego.db"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "alterego.db".to_string())
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("alterego"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "alterego-data".to_string())
}

fn default_true() -> bool {
    true
}

/// Which vector index implementation backs long-term memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategy {
    /// Brute-force cosine scan over the SQLite store.
    #[default]
    Sqlite,
    /// In-memory exact L2 index with a binary snapshot and JSON sidecar.
    Flat,
}

/// Memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Load the local embedding model. `false` disables similarity search.
    #[serde(default = "default_true")]
    pub embeddings: bool,

    /// Name of the ONNX embedding model.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Maximum number of turns held in the short-term buffer.
    #[serde(default = "default_stm_capacity")]
    pub stm_capacity: usize,

    /// Number of memories retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cosine similarity a hit must exceed (similarity indexes).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Largest accepted distance (distance indexes). `None` accepts all.
    #[serde(default)]
    pub max_distance: Option<f32>,

    /// Index implementation.
    #[serde(default)]
    pub index: IndexStrategy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embeddings: true,
            model_name: default_model_name(),
            stm_capacity: default_stm_capacity(),
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            max_distance: None,
            index: IndexStrategy::default(),
        }
    }
}

impl MemoryConfig {
    pub fn relevance_filter(&self) -> RelevanceFilter {
        RelevanceFilter {
            min_similarity: self.similarity_threshold,
            max_distance: self.max_distance,
        }
    }
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_stm_capacity() -> usize {
    10
}

fn default_top_k() -> usize {
    2
}

fn default_similarity_threshold() -> f32 {
    0.3
}

/// Unit a prompt budget is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    #[default]
    Tokens,
    Chars,
}

/// Prompt assembly configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// How many of the most recent short-term turns go into each prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Maximum prompt size. `None` disables shedding.
    #[serde(default)]
    pub budget: Option<usize>,

    /// Unit of `budget`.
    #[serde(default)]
    pub budget_unit: BudgetUnit,

    /// Periodically condense the transcript into a long-term summary.
    #[serde(default)]
    pub long_term_summary: bool,

    /// Remembered exchanges between summary refreshes.
    #[serde(default = "default_summary_interval")]
    pub summary_interval: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_turns: default_history_turns(),
            budget: None,
            budget_unit: BudgetUnit::default(),
            long_term_summary: false,
            summary_interval: default_summary_interval(),
        }
    }
}

fn default_history_turns() -> usize {
    6
}

fn default_summary_interval() -> usize {
    10
}

/// Selects which configured backend handles queries by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local model server driven through its CLI.
    #[default]
    Local,
    /// Remote OpenAI-compatible chat-completion API.
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" => Ok(Self::Local),
            "remote" | "openai" => Ok(Self::Remote),
            other => Err(format!("unknown backend `{other}` (expected local or remote)")),
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Backend used when a query does not name one.
    #[serde(default)]
    pub default: BackendKind,

    #[serde(default)]
    pub local: LocalBackendConfig,

    #[serde(default)]
    pub remote: RemoteBackendConfig,
}

/// Local model server (Ollama) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LocalBackendConfig {
    /// Path or name of the `ollama` executable.
    #[serde(default = "default_ollama_executable")]
    pub executable: String,

    /// Model the persona model is derived from (`FROM` line).
    #[serde(default = "default_base_model")]
    pub base_model: String,

    /// Name of the derived persona model.
    #[serde(default = "default_local_model_name")]
    pub model_name: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Context window passed as `num_ctx`.
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    /// Base URL used to probe server readiness.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Spawn and own `ollama serve`. Disable when a server is already running.
    #[serde(default = "default_true")]
    pub manage_server: bool,

    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    #[serde(default = "default_local_query_timeout_secs")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_local_warm_up_timeout_secs")]
    pub warm_up_timeout_secs: u64,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            executable: default_ollama_executable(),
            base_model: default_base_model(),
            model_name: default_local_model_name(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            server_url: default_server_url(),
            manage_server: true,
            startup_timeout_secs: default_startup_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            query_timeout_secs: default_local_query_timeout_secs(),
            warm_up_timeout_secs: default_local_warm_up_timeout_secs(),
        }
    }
}

impl LocalBackendConfig {
    pub fn timeouts(&self) -> BackendTimeouts {
        BackendTimeouts {
            startup: Duration::from_secs(self.startup_timeout_secs),
            shutdown: Duration::from_secs(self.shutdown_timeout_secs),
            query: Duration::from_secs(self.query_timeout_secs),
            warm_up: Duration::from_secs(self.warm_up_timeout_secs),
        }
    }
}

fn default_ollama_executable() -> String {
    "ollama".to_string()
}

fn default_base_model() -> String {
    "artifish/llama3.2-uncensored".to_string()
}

fn default_local_model_name() -> String {
    "ALTER_EGO".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_num_ctx() -> u32 {
    4096
}

fn default_server_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_local_query_timeout_secs() -> u64 {
    120
}

fn default_local_warm_up_timeout_secs() -> u64 {
    300
}

/// Remote chat-completion API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteBackendConfig {
    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_remote_base_url")]
    pub base_url: String,

    #[serde(default = "default_remote_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate. `None` leaves it to the API.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_remote_query_timeout_secs")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_remote_warm_up_timeout_secs")]
    pub warm_up_timeout_secs: u64,

    /// Extra attempts on 429/5xx responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RemoteBackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_remote_base_url(),
            model: default_remote_model(),
            temperature: default_temperature(),
            max_tokens: None,
            query_timeout_secs: default_remote_query_timeout_secs(),
            warm_up_timeout_secs: default_remote_warm_up_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl RemoteBackendConfig {
    /// A remote backend has no process, so startup and shutdown are instant.
    pub fn timeouts(&self) -> BackendTimeouts {
        BackendTimeouts {
            startup: Duration::ZERO,
            shutdown: Duration::ZERO,
            query: Duration::from_secs(self.query_timeout_secs),
            warm_up: Duration::from_secs(self.warm_up_timeout_secs),
        }
    }
}

fn default_remote_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_remote_model() -> String {
    "chatgpt-4o-latest".to_string()
}

fn default_remote_query_timeout_secs() -> u64 {
    60
}

fn default_remote_warm_up_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    1
}

/// Per-backend wait limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub startup: Duration,
    pub shutdown: Duration,
    pub query: Duration,
    pub warm_up: Duration,
}
