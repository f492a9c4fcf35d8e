// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nearest-neighbour search over a persona's stored utterances.

use async_trait::async_trait;

use crate::error::AlterEgoError;
use crate::types::{MemoryRecord, ScoreKind, SearchResult};

/// Similarity search shared by every index strategy.
///
/// An instance is bound to one persona. Missing embedding support never
/// surfaces as an error: `search` returns nothing and writes keep the text
/// without a vector.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Score convention of every [`SearchResult`] this index returns.
    fn score_kind(&self) -> ScoreKind;

    /// Embeds `text` with the injected model, `None` when unavailable.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Embeds and stores free text, returning its id.
    async fn add(&self, text: &str) -> Result<i64, AlterEgoError>;

    /// Makes an already persisted record searchable, returning its index id.
    async fn index_record(&self, record: &MemoryRecord) -> Result<i64, AlterEgoError>;

    /// Up to `k` nearest entries, most relevant first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, AlterEgoError>;

    /// Drops all in-memory and on-disk index state for the persona.
    async fn reset(&self) -> Result<(), AlterEgoError>;
}
