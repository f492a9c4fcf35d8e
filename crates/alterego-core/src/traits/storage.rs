// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable per-persona record storage.

use async_trait::async_trait;

use crate::error::AlterEgoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MemoryRecord, NewRecord, Turn};

/// Durable storage backing both memory tiers.
///
/// Every persona is an isolated namespace. Writes are flushed to stable
/// storage before the call returns, and each record is written atomically.
#[async_trait]
pub trait PersistentStore: PluginAdapter {
    /// Creates the persona namespace if absent. Idempotent.
    async fn initialize(&self, persona: &str) -> Result<(), AlterEgoError>;

    /// Durably writes one record, embedding it when an embedder is available.
    async fn append(&self, persona: &str, record: NewRecord)
        -> Result<MemoryRecord, AlterEgoError>;

    /// Writes several records in one transaction: all of them or none.
    async fn append_batch(
        &self,
        persona: &str,
        records: Vec<NewRecord>,
    ) -> Result<Vec<MemoryRecord>, AlterEgoError>;

    /// Conversation turns in insertion order, optionally only the last `limit`.
    async fn read_transcript(
        &self,
        persona: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Turn>, AlterEgoError>;

    /// Searchable records (conversation and notes) that carry an embedding.
    async fn read_all_embedded(&self, persona: &str) -> Result<Vec<MemoryRecord>, AlterEgoError>;

    /// Most recent summary record, if one was ever stored.
    async fn latest_summary(&self, persona: &str) -> Result<Option<MemoryRecord>, AlterEgoError>;

    /// Deletes every record of the persona.
    async fn clear(&self, persona: &str) -> Result<(), AlterEgoError>;
}
