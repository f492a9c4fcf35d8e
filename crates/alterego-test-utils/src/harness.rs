// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete [`AgentContext`] over a temp SQLite
//! database, mock backends for both backend kinds and an optional
//! deterministic embedder. `ask()` drives the full query pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alterego_agent::{AgentContext, QueryRequest, QueryResponse};
use alterego_backend::BackendOrchestrator;
use alterego_config::model::{
    AlterEgoConfig, BackendConfig, BackendKind, BackendTimeouts, ContextConfig, MemoryConfig,
    StorageConfig,
};
use alterego_core::{AlterEgoError, EmbeddingAdapter, PersistentStore, PromptShape};
use alterego_storage::SqliteStore;

use crate::embedders::HashEmbedder;
use crate::flaky_store::FlakyStore;
use crate::mock_backend::MockBackend;

/// Instructions used by [`TestHarness::ask`].
pub const TEST_INSTRUCTIONS: &str = "You are a test persona.";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    memory: MemoryConfig,
    context: ContextConfig,
    default_backend: BackendKind,
    query_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            embedder: Some(Arc::new(HashEmbedder::default())),
            memory: MemoryConfig::default(),
            context: ContextConfig::default(),
            default_backend: BackendKind::Local,
            query_timeout: Duration::from_secs(5),
        }
    }

    /// Responses queued on the default backend's mock.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Replace the default [`HashEmbedder`].
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Run without an embedder; recall always comes back empty.
    pub fn without_embedder(mut self) -> Self {
        self.embedder = None;
        self
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    pub fn with_stm_capacity(mut self, capacity: usize) -> Self {
        self.memory.stm_capacity = capacity;
        self
    }

    pub fn with_default_backend(mut self, kind: BackendKind) -> Self {
        self.default_backend = kind;
        self
    }

    /// Query timeout applied to both backends.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, AlterEgoError> {
        let temp_dir = tempfile::TempDir::new().map_err(AlterEgoError::storage)?;

        let storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").display().to_string(),
            data_dir: temp_dir.path().join("data").display().to_string(),
            wal_mode: true,
            export_transcript_json: true,
        };
        let config = AlterEgoConfig {
            storage,
            memory: MemoryConfig {
                embeddings: self.embedder.is_some(),
                ..self.memory
            },
            context: self.context,
            backend: BackendConfig {
                default: self.default_backend,
                ..BackendConfig::default()
            },
            ..AlterEgoConfig::default()
        };

        let local = Arc::new(MockBackend::new(PromptShape::Completion));
        let remote = Arc::new(MockBackend::new(PromptShape::Chat));
        let default_mock = match self.default_backend {
            BackendKind::Local => &local,
            BackendKind::Remote => &remote,
        };
        for response in self.responses {
            default_mock.push_response(response);
        }

        let (ctx, store) = open_context(
            &config,
            self.embedder.clone(),
            &local,
            &remote,
            self.query_timeout,
        )
        .await?;
        Ok(TestHarness {
            ctx,
            local,
            remote,
            store,
            embedder: self.embedder,
            config,
            query_timeout: self.query_timeout,
            _temp_dir: temp_dir,
        })
    }
}

/// Opens a store and context over the configured database.
async fn open_context(
    config: &AlterEgoConfig,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    local: &Arc<MockBackend>,
    remote: &Arc<MockBackend>,
    query_timeout: Duration,
) -> Result<(AgentContext, Arc<FlakyStore>), AlterEgoError> {
    let sqlite = SqliteStore::new(config.storage.clone(), embedder.clone());
    sqlite.open().await?;
    let store = Arc::new(FlakyStore::new(Arc::new(sqlite)));

    let timeouts = BackendTimeouts {
        startup: Duration::from_secs(1),
        shutdown: Duration::from_secs(1),
        query: query_timeout,
        warm_up: query_timeout,
    };
    let mut backends = HashMap::new();
    backends.insert(
        BackendKind::Local,
        Arc::new(BackendOrchestrator::new(
            BackendKind::Local,
            local.clone(),
            timeouts,
        )),
    );
    backends.insert(
        BackendKind::Remote,
        Arc::new(BackendOrchestrator::new(
            BackendKind::Remote,
            remote.clone(),
            timeouts,
        )),
    );

    let ctx = AgentContext::new(
        config.clone(),
        store.clone() as Arc<dyn PersistentStore>,
        embedder,
        backends,
    );
    Ok((ctx, store))
}

/// A complete test environment with mock backends and temp storage.
pub struct TestHarness {
    ctx: AgentContext,
    /// Mock behind the `local` orchestrator (completion-shaped).
    pub local: Arc<MockBackend>,
    /// Mock behind the `remote` orchestrator (chat-shaped).
    pub remote: Arc<MockBackend>,
    store: Arc<FlakyStore>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    config: AlterEgoConfig,
    query_timeout: Duration,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Simulates a process restart: shuts the context down and rebuilds it
    /// from what is on disk. Mock backends and their queues are kept.
    pub async fn restart(&mut self) -> Result<(), AlterEgoError> {
        self.ctx.shutdown().await;
        let (ctx, store) = open_context(
            &self.config,
            self.embedder.clone(),
            &self.local,
            &self.remote,
            self.query_timeout,
        )
        .await?;
        self.ctx = ctx;
        self.store = store;
        Ok(())
    }

    pub fn ctx(&self) -> &AgentContext {
        &self.ctx
    }

    /// The store wrapper, for injecting write failures.
    pub fn store(&self) -> &FlakyStore {
        &self.store
    }

    pub fn config(&self) -> &AlterEgoConfig {
        &self.config
    }

    /// Sends `query` as `persona` to the default backend.
    pub async fn ask(&self, persona: &str, query: &str) -> Result<QueryResponse, AlterEgoError> {
        self.ctx
            .handle_query(QueryRequest::new(persona, TEST_INSTRUCTIONS, query))
            .await
    }

    /// Sends `query` as `persona` to the given backend.
    pub async fn ask_backend(
        &self,
        persona: &str,
        query: &str,
        kind: BackendKind,
    ) -> Result<QueryResponse, AlterEgoError> {
        self.ctx
            .handle_query(QueryRequest::new(persona, TEST_INSTRUCTIONS, query).with_backend(kind))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_with_defaults() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.ctx().similarity_enabled());
        assert_eq!(harness.config().backend.default, BackendKind::Local);
    }

    #[tokio::test]
    async fn harness_without_embedder_disables_similarity() {
        let harness = TestHarness::builder().without_embedder().build().await.unwrap();
        assert!(!harness.ctx().similarity_enabled());
        assert!(!harness.config().memory.embeddings);
    }
}
