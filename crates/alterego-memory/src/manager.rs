// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-persona memory facade.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, warn};

use alterego_core::{
    AlterEgoError, MemoryRecord, NewRecord, PersistentStore, RelevanceFilter, ScoreKind,
    SearchResult, Turn, VectorIndex,
};

use crate::short_term::ShortTermMemory;

/// Composes the short-term buffer, a vector index and the persistent store
/// for one persona.
///
/// Writes go to the store first. The index and the buffer are only touched
/// once the store has committed, so in-memory state never refers to turns
/// that are missing from disk.
pub struct MemoryManager {
    persona: String,
    store: Arc<dyn PersistentStore>,
    index: Arc<dyn VectorIndex>,
    stm: Mutex<ShortTermMemory>,
    remembered: AtomicUsize,
}

impl MemoryManager {
    /// Registers the persona and rehydrates the buffer from the last
    /// `stm_capacity` persisted turns.
    pub async fn open(
        persona: &str,
        store: Arc<dyn PersistentStore>,
        index: Arc<dyn VectorIndex>,
        stm_capacity: usize,
    ) -> Result<Self, AlterEgoError> {
        store.initialize(persona).await?;
        let tail = store.read_transcript(persona, Some(stm_capacity)).await?;
        debug!(persona, rehydrated = tail.len(), "short-term memory rehydrated");
        Ok(Self {
            persona: persona.to_string(),
            store,
            index,
            stm: Mutex::new(ShortTermMemory::rehydrate(stm_capacity, tail)),
            remembered: AtomicUsize::new(0),
        })
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn score_kind(&self) -> ScoreKind {
        self.index.score_kind()
    }

    fn stm(&self) -> MutexGuard<'_, ShortTermMemory> {
        self.stm.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current short-term buffer, oldest first.
    pub fn get_short_term(&self) -> Vec<Turn> {
        self.stm().get()
    }

    /// The newest `m` buffered turns, oldest first.
    pub fn short_term_tail(&self, m: usize) -> Vec<Turn> {
        self.stm().tail(m)
    }

    /// Up to `k` hits accepted by `filter`, most relevant first.
    ///
    /// Index failures are logged and yield an empty list.
    pub async fn recall(&self, query: &str, k: usize, filter: &RelevanceFilter) -> Vec<SearchResult> {
        match self.index.search(query, k).await {
            Ok(hits) => {
                let total = hits.len();
                let kept: Vec<SearchResult> = hits.into_iter().filter(|h| filter.accepts(h)).collect();
                debug!(persona = %self.persona, k, total, kept = kept.len(), "recall");
                kept
            }
            Err(e) => {
                warn!(persona = %self.persona, error = %e, "memory search failed, continuing without recall");
                Vec::new()
            }
        }
    }

    /// Persists a user/assistant exchange, indexes it, then appends both
    /// turns to the short-term buffer.
    ///
    /// A store failure is logged and returned without touching in-memory
    /// state. Index failures are absorbed.
    pub async fn remember(&self, query: &str, response: &str) -> Result<Vec<MemoryRecord>, AlterEgoError> {
        let batch = vec![
            NewRecord::conversation(Turn::user(query)),
            NewRecord::conversation(Turn::assistant(response)),
        ];
        let records = match self.store.append_batch(&self.persona, batch).await {
            Ok(records) => records,
            Err(e) => {
                error!(persona = %self.persona, error = %e, "failed to persist exchange, turn lost");
                return Err(e);
            }
        };

        for record in &records {
            if let Err(e) = self.index.index_record(record).await {
                warn!(persona = %self.persona, record_id = record.id, error = %e, "failed to index record");
            }
        }

        {
            let mut stm = self.stm();
            for record in &records {
                stm.append(record.turn.clone());
            }
        }
        self.remembered.fetch_add(1, Ordering::Relaxed);
        Ok(records)
    }

    /// Adds free text to long-term memory without touching the transcript.
    pub async fn add_note(&self, text: &str) -> Result<i64, AlterEgoError> {
        self.index.add(text).await
    }

    /// Exchanges remembered since this manager was opened.
    pub fn remembered_count(&self) -> usize {
        self.remembered.load(Ordering::Relaxed)
    }

    /// Full persisted transcript, or its last `limit` turns.
    pub async fn transcript(&self, limit: Option<usize>) -> Result<Vec<Turn>, AlterEgoError> {
        self.store.read_transcript(&self.persona, limit).await
    }

    pub async fn latest_summary(&self) -> Result<Option<String>, AlterEgoError> {
        Ok(self
            .store
            .latest_summary(&self.persona)
            .await?
            .map(|record| record.turn.content))
    }

    pub async fn store_summary(&self, summary: &str) -> Result<i64, AlterEgoError> {
        let record = self
            .store
            .append(&self.persona, NewRecord::summary(summary))
            .await?;
        Ok(record.id)
    }

    /// Deletes every persisted record and resets the index and buffer.
    pub async fn clear_all(&self) -> Result<(), AlterEgoError> {
        self.store.clear(&self.persona).await?;
        if let Err(e) = self.index.reset().await {
            warn!(persona = %self.persona, error = %e, "failed to reset index");
        }
        self.stm().clear();
        self.remembered.store(0, Ordering::Relaxed);
        debug!(persona = %self.persona, "persona memory cleared");
        Ok(())
    }
}
