// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local ONNX sentence embedder.
//!
//! Runs a sentence-transformers model (all-MiniLM-L6-v2 by default) on CPU.
//! Output vectors are mean-pooled over the attention mask and L2-normalized,
//! so cosine similarity between two of them is their dot product.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use alterego_core::{
    AdapterType, AlterEgoError, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus,
    PluginAdapter,
};

/// Hidden size of all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

fn embed_err(context: &str, e: impl std::fmt::Display) -> AlterEgoError {
    AlterEgoError::Embedding {
        message: format!("{context}: {e}"),
    }
}

/// ONNX embedding adapter.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    model_name: String,
}

// Safety: the session is only reached through the Mutex, and the tokenizer
// is read-only after construction.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    /// Loads `model.onnx` and the `tokenizer.json` next to it.
    pub fn new(model_path: &Path, model_name: &str) -> Result<Self, AlterEgoError> {
        let model_dir = model_path
            .parent()
            .ok_or_else(|| embed_err("invalid model path", model_path.display()))?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            embed_err(
                &format!("failed to load tokenizer from {}", tokenizer_path.display()),
                e,
            )
        })?;

        let session = Session::builder()
            .map_err(|e| embed_err("failed to create ONNX session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| embed_err("failed to set optimization level", e))?
            .with_intra_threads(1)
            .map_err(|e| embed_err("failed to set thread count", e))?
            .commit_from_file(model_path)
            .map_err(|e| {
                embed_err(
                    &format!("failed to load ONNX model from {}", model_path.display()),
                    e,
                )
            })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_name: model_name.to_string(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Embeds one text into a normalized vector.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, AlterEgoError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| embed_err("tokenization failed", e))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let input_ids = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| embed_err("input_ids tensor", e))?;
        let mask = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| embed_err("attention_mask tensor", e))?;
        let type_ids = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| embed_err("token_type_ids tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| embed_err("ONNX session lock poisoned", e))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => TensorRef::from_array_view(&input_ids).map_err(|e| embed_err("input_ids view", e))?,
                "attention_mask" => TensorRef::from_array_view(&mask).map_err(|e| embed_err("attention_mask view", e))?,
                "token_type_ids" => TensorRef::from_array_view(&type_ids).map_err(|e| embed_err("token_type_ids view", e))?
            ])
            .map_err(|e| embed_err("ONNX inference failed", e))?;

        // [1, seq_len, hidden]
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| embed_err("failed to extract output tensor", e))?;
        let hidden_size = shape
            .last()
            .map(|&d| d as usize)
            .ok_or_else(|| embed_err("output tensor", "empty shape"))?;

        let pooled = mean_pool_with_attention(data, &attention_mask, seq_len, hidden_size);
        Ok(l2_normalize(&pooled))
    }
}

fn mean_pool_with_attention(
    embeddings: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (i, &mask) in attention_mask.iter().enumerate().take(seq_len) {
        if mask > 0 {
            let token = &embeddings[i * hidden_size..(i + 1) * hidden_size];
            for (acc, v) in sum.iter_mut().zip(token) {
                *acc += v;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }
    sum
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

#[async_trait]
impl PluginAdapter for OnnxEmbedder {
    fn name(&self) -> &str {
        "onnx-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        match self.session.lock() {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("session lock poisoned: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, AlterEgoError> {
        let mut embeddings = Vec::with_capacity(input.texts.len());
        for text in &input.texts {
            embeddings.push(self.embed_text(text)?);
        }
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: EMBEDDING_DIM,
        })
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}
