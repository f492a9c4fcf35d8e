// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::AlterEgoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Converts text into fixed-length vectors.
///
/// Implementations must be deterministic: identical input yields an identical
/// vector. Stores and indexes hold an `Option<Arc<dyn EmbeddingAdapter>>` and
/// degrade to no-similarity retrieval when it is `None`.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates one embedding per input text.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, AlterEgoError>;

    /// Length of every vector this adapter produces.
    fn dimensions(&self) -> usize;
}

/// Embeds a single text.
pub async fn embed_one(
    adapter: &dyn EmbeddingAdapter,
    text: &str,
) -> Result<Vec<f32>, AlterEgoError> {
    let output = adapter
        .embed(EmbeddingInput {
            texts: vec![text.to_string()],
        })
        .await?;
    output
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| AlterEgoError::Embedding {
            message: "embedding adapter returned no vectors".to_string(),
        })
}

/// Embeds a single text, logging and absorbing any failure.
pub async fn try_embed(adapter: Option<&dyn EmbeddingAdapter>, text: &str) -> Option<Vec<f32>> {
    let adapter = adapter?;
    match embed_one(adapter, text).await {
        Ok(vector) => Some(vector),
        Err(e) => {
            tracing::warn!(adapter = adapter.name(), error = %e, "embedding failed, continuing without vector");
            None
        }
    }
}
