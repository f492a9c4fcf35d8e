// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query handling for Alter Ego.
//!
//! [`AgentContext`] is the explicit application context: it owns the memory
//! registry, the prompt assembler and one orchestrator per backend, and is
//! passed by reference to whatever front end drives it. A query flows
//! through recall, prompt assembly, dispatch and, only on success,
//! persistence.

pub mod query;
pub mod shutdown;
pub mod summary;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use alterego_backend::{BackendOrchestrator, BackendStatus, build_orchestrators};
use alterego_config::model::{AlterEgoConfig, BackendKind};
use alterego_context::{PromptAssembler, PromptInput, WARM_UP_RESPONSE, is_warm_up};
use alterego_core::{AlterEgoError, EmbeddingAdapter, PersistentStore, Turn};
use alterego_memory::{MemoryRegistry, load_embedder};
use alterego_storage::SqliteStore;

pub use query::{QueryRequest, QueryResponse};
pub use shutdown::shutdown_token;

/// Everything a query needs, built once per process.
pub struct AgentContext {
    config: AlterEgoConfig,
    store: Arc<dyn PersistentStore>,
    registry: MemoryRegistry,
    assembler: PromptAssembler,
    backends: HashMap<BackendKind, Arc<BackendOrchestrator>>,
}

impl AgentContext {
    /// Assembles a context from already-built parts.
    pub fn new(
        config: AlterEgoConfig,
        store: Arc<dyn PersistentStore>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
        backends: HashMap<BackendKind, Arc<BackendOrchestrator>>,
    ) -> Self {
        let registry = MemoryRegistry::new(
            Arc::clone(&store),
            embedder,
            &config.memory,
            config.storage.data_dir_path(),
        );
        let assembler = PromptAssembler::new(&config.context);
        Self {
            config,
            store,
            registry,
            assembler,
            backends,
        }
    }

    /// Loads the embedder, opens the store and builds both backends.
    ///
    /// A missing embedding model or missing remote credentials degrade the
    /// affected capability; only an unusable database fails construction.
    pub async fn from_config(config: AlterEgoConfig) -> Result<Self, AlterEgoError> {
        let data_dir = config.storage.data_dir_path();
        let embedder = load_embedder(&config.memory, &data_dir).await;

        let store = SqliteStore::new(config.storage.clone(), embedder.clone());
        store.open().await?;

        let backends = build_orchestrators(&config.backend, &data_dir);
        info!(
            agent = %config.agent.name,
            default_backend = %config.backend.default,
            similarity = embedder.is_some(),
            "agent context ready"
        );
        Ok(Self::new(config, Arc::new(store), embedder, backends))
    }

    pub fn config(&self) -> &AlterEgoConfig {
        &self.config
    }

    pub fn registry(&self) -> &MemoryRegistry {
        &self.registry
    }

    /// The orchestrator for `kind`, or the configured default.
    pub fn backend(&self, kind: Option<BackendKind>) -> Result<&Arc<BackendOrchestrator>, AlterEgoError> {
        let kind = kind.unwrap_or(self.config.backend.default);
        self.backends
            .get(&kind)
            .ok_or_else(|| AlterEgoError::Config(format!("backend `{kind}` is not configured")))
    }

    /// Answers one query.
    ///
    /// The warm-up sentinel only warms the backend and never touches
    /// memory. Otherwise a backend failure is returned with memory left
    /// unchanged, and a storage failure after a successful generation still
    /// returns the text with `memory_persisted = false`.
    pub async fn handle_query(&self, request: QueryRequest) -> Result<QueryResponse, AlterEgoError> {
        request.validate()?;
        let backend = self.backend(request.backend)?;

        if is_warm_up(&request.query) {
            let outcome = backend.warm_up(&request.instructions).await?;
            debug!(persona = %request.persona, backend = %backend.kind(), ?outcome, "warm-up query");
            return Ok(QueryResponse {
                text: WARM_UP_RESPONSE.to_string(),
                backend: backend.kind(),
                memory_persisted: false,
                warm_up: true,
                usage: None,
            });
        }

        let started = Instant::now();
        backend.ensure_started().await?;
        let manager = self.registry.get_or_create(&request.persona).await?;

        let memory = &self.config.memory;
        let memories = manager
            .recall(&request.query, memory.top_k, &memory.relevance_filter())
            .await;
        let history = manager.short_term_tail(self.assembler.history_turns());
        let summary = if self.config.context.long_term_summary {
            manager.latest_summary().await.unwrap_or_else(|e| {
                warn!(persona = %request.persona, error = %e, "cannot read summary, continuing without it");
                None
            })
        } else {
            None
        };

        let prompt = self.assembler.assemble(
            backend.prompt_shape(),
            &PromptInput {
                persona_instructions: &request.instructions,
                memories: &memories,
                history: &history,
                summary: summary.as_deref(),
                query: &request.query,
            },
        )?;

        let generation = backend.query(&prompt).await?;

        let memory_persisted = manager
            .remember(&request.query, &generation.text)
            .await
            .is_ok();

        let context = &self.config.context;
        if memory_persisted
            && context.long_term_summary
            && summary::summary_due(manager.remembered_count(), context.summary_interval)
        {
            summary::refresh_summary(
                &manager,
                backend,
                &request.instructions,
                context.summary_interval * 2,
            )
            .await;
        }

        info!(
            persona = %request.persona,
            backend = %backend.kind(),
            recalled = memories.len(),
            history = history.len(),
            memory_persisted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query handled"
        );
        Ok(QueryResponse {
            text: generation.text,
            backend: backend.kind(),
            memory_persisted,
            warm_up: false,
            usage: generation.usage,
        })
    }

    /// The persona's persisted transcript, or its last `limit` turns.
    pub async fn history(&self, persona: &str, limit: Option<usize>) -> Result<Vec<Turn>, AlterEgoError> {
        let manager = self.registry.get_or_create(persona).await?;
        manager.transcript(limit).await
    }

    /// Adds free text to the persona's long-term memory.
    pub async fn add_note(&self, persona: &str, text: &str) -> Result<i64, AlterEgoError> {
        if text.trim().is_empty() {
            return Err(AlterEgoError::InvalidInput("note must not be empty".into()));
        }
        let manager = self.registry.get_or_create(persona).await?;
        manager.add_note(text).await
    }

    /// Deletes everything remembered for `persona`.
    pub async fn clear_persona(&self, persona: &str) -> Result<(), AlterEgoError> {
        self.registry.clear_persona(persona).await?;
        info!(persona, "persona memory cleared");
        Ok(())
    }

    /// Status of every backend, in a stable order.
    pub async fn backend_status(&self) -> Vec<BackendStatus> {
        let mut kinds: Vec<BackendKind> = self.backends.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        let mut statuses = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if let Some(backend) = self.backends.get(&kind) {
                statuses.push(backend.status().await);
            }
        }
        statuses
    }

    pub fn similarity_enabled(&self) -> bool {
        self.registry.has_embedder()
    }

    /// Stops every backend and releases the store. Errors are logged so
    /// that one failing backend does not keep the others running.
    pub async fn shutdown(&self) {
        for (kind, backend) in &self.backends {
            if let Err(e) = backend.stop().await {
                warn!(backend = %kind, error = %e, "backend did not stop cleanly");
            }
        }
        if let Err(e) = self.store.shutdown().await {
            warn!(error = %e, "store did not shut down cleanly");
        }
        debug!("agent context shut down");
    }
}
