// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazily created memory managers keyed by persona.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::info;

use alterego_config::model::{IndexStrategy, MemoryConfig};
use alterego_core::{AlterEgoError, EmbeddingAdapter, PersistentStore, VectorIndex};

use crate::index::{FlatIndex, SqliteCosineIndex};
use crate::manager::MemoryManager;

type Slot = Arc<OnceCell<Arc<MemoryManager>>>;

/// Owns one [`MemoryManager`] per persona.
///
/// Concurrent first requests for the same persona share one construction;
/// different personas are built in parallel.
pub struct MemoryRegistry {
    managers: DashMap<String, Slot>,
    store: Arc<dyn PersistentStore>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    strategy: IndexStrategy,
    stm_capacity: usize,
    data_dir: PathBuf,
}

impl MemoryRegistry {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
        config: &MemoryConfig,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            managers: DashMap::new(),
            store,
            embedder,
            strategy: config.index,
            stm_capacity: config.stm_capacity,
            data_dir,
        }
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Returns the persona's manager, building it on first use.
    pub async fn get_or_create(&self, persona: &str) -> Result<Arc<MemoryManager>, AlterEgoError> {
        // Clone the slot out so the map shard is not locked across the await.
        let slot: Slot = self
            .managers
            .entry(persona.to_string())
            .or_default()
            .value()
            .clone();
        let manager = slot.get_or_try_init(|| self.build(persona)).await?;
        Ok(Arc::clone(manager))
    }

    async fn build(&self, persona: &str) -> Result<Arc<MemoryManager>, AlterEgoError> {
        let index: Arc<dyn VectorIndex> = match self.strategy {
            IndexStrategy::Sqlite => Arc::new(SqliteCosineIndex::new(
                persona,
                Arc::clone(&self.store),
                self.embedder.clone(),
            )),
            IndexStrategy::Flat => {
                Arc::new(FlatIndex::open(persona, &self.data_dir, self.embedder.clone()).await?)
            }
        };
        let manager =
            MemoryManager::open(persona, Arc::clone(&self.store), index, self.stm_capacity).await?;
        info!(persona, strategy = ?self.strategy, "memory manager created");
        Ok(Arc::new(manager))
    }

    /// Drops the cached manager. The next request rebuilds it from storage.
    pub fn remove(&self, persona: &str) -> bool {
        self.managers.remove(persona).is_some()
    }

    /// Clears the persona's memory and drops its cached manager.
    pub async fn clear_persona(&self, persona: &str) -> Result<(), AlterEgoError> {
        let manager = self.get_or_create(persona).await?;
        manager.clear_all().await?;
        self.remove(persona);
        Ok(())
    }

    /// Personas with a live manager.
    pub fn personas(&self) -> Vec<String> {
        self.managers.iter().map(|e| e.key().clone()).collect()
    }
}
