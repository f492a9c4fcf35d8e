// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedders standing in for the ONNX model.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use alterego_core::{
    AdapterType, AlterEgoError, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus,
    PluginAdapter,
};

/// Bag-of-words vectors: each lowercase word hashes to one signed bucket.
///
/// Texts sharing words have positive cosine similarity; texts with no words
/// in common are (almost always) orthogonal.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl PluginAdapter for HashEmbedder {
    fn name(&self) -> &str {
        "hash-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for HashEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, AlterEgoError> {
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector(t)).collect(),
            dimensions: self.dimensions,
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Fixed text-to-vector table for exact similarity scenarios.
///
/// Text missing from the table gets the fallback vector, or fails to
/// embed when there is none.
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    dimensions: usize,
}

impl TableEmbedder {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let table: HashMap<String, Vec<f32>> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let dimensions = table.values().next().map_or(0, Vec::len);
        Self {
            table,
            fallback: None,
            dimensions,
        }
    }

    pub fn with_fallback(mut self, fallback: Vec<f32>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl PluginAdapter for TableEmbedder {
    fn name(&self) -> &str {
        "table-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for TableEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, AlterEgoError> {
        let mut embeddings = Vec::with_capacity(input.texts.len());
        for text in &input.texts {
            let vector = self
                .table
                .get(text)
                .or(self.fallback.as_ref())
                .ok_or_else(|| AlterEgoError::Embedding {
                    message: format!("no table entry for {text:?}"),
                })?;
            embeddings.push(vector.clone());
        }
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimensions,
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hash_vectors_are_deterministic_and_unit_length() {
        let embedder = HashEmbedder::default();
        let a = embedder.vector("Hello world");
        assert_eq!(a, embedder.vector("hello WORLD"));
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_words_raise_similarity() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.vector("favourite colour");
        let related = embedder.vector("my favourite colour is green");
        let unrelated = embedder.vector("the train leaves at noon");
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_zero() {
        let v = HashEmbedder::default().vector("  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn table_falls_back_or_fails() {
        let table = TableEmbedder::new([("a", vec![1.0, 0.0])]);
        let err = table
            .embed(EmbeddingInput {
                texts: vec!["b".into()],
            })
            .await;
        assert!(err.is_err());

        let table = table.with_fallback(vec![0.0, 1.0]);
        let out = table
            .embed(EmbeddingInput {
                texts: vec!["a".into(), "b".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(out.dimensions, 2);
    }
}
