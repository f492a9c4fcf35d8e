// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cosine scan over the persistent store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use alterego_core::{
    AlterEgoError, EmbeddingAdapter, MemoryRecord, NewRecord, PersistentStore, ScoreKind,
    SearchResult, VectorIndex, try_embed,
};

use super::cosine_similarity;

/// Index that keeps no state of its own.
///
/// Vectors are written by the store together with their text, so indexing a
/// persisted record is a no-op and `search` reads every embedded record of
/// the persona. Scores are `cosine * importance`.
pub struct SqliteCosineIndex {
    persona: String,
    store: Arc<dyn PersistentStore>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
}

impl SqliteCosineIndex {
    pub fn new(
        persona: &str,
        store: Arc<dyn PersistentStore>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
    ) -> Self {
        Self {
            persona: persona.to_string(),
            store,
            embedder,
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteCosineIndex {
    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Similarity
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        try_embed(self.embedder.as_deref(), text).await
    }

    async fn add(&self, text: &str) -> Result<i64, AlterEgoError> {
        let record = self.store.append(&self.persona, NewRecord::note(text)).await?;
        Ok(record.id)
    }

    async fn index_record(&self, record: &MemoryRecord) -> Result<i64, AlterEgoError> {
        Ok(record.id)
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, AlterEgoError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(query_vec) = self.embed(query).await else {
            return Ok(Vec::new());
        };

        let records = self.store.read_all_embedded(&self.persona).await?;
        let scanned = records.len();
        let mut results: Vec<SearchResult> = records
            .into_iter()
            .filter_map(|record| {
                let embedding = record.embedding.as_deref()?;
                if embedding.len() != query_vec.len() {
                    return None;
                }
                let score = cosine_similarity(&query_vec, embedding) * record.importance;
                Some(SearchResult {
                    text: record.turn.content,
                    score,
                    record_id: record.id,
                    kind: ScoreKind::Similarity,
                })
            })
            .collect();

        ScoreKind::Similarity.sort(&mut results);
        results.truncate(k);
        debug!(persona = %self.persona, scanned, returned = results.len(), "cosine scan");
        Ok(results)
    }

    /// The store owns the vectors; clearing the store clears the index.
    async fn reset(&self) -> Result<(), AlterEgoError> {
        Ok(())
    }
}
