// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational memory for Alter Ego.
//!
//! ## Architecture
//!
//! - **OnnxEmbedder**: local sentence embeddings, downloaded on first use by
//!   **ModelManager**
//! - **ShortTermMemory**: FIFO buffer of recent turns
//! - **SqliteCosineIndex** / **FlatIndex**: the two `VectorIndex` strategies
//! - **MemoryManager**: per-persona facade over buffer, index and store
//! - **MemoryRegistry**: lazy persona to manager map

pub mod embedder;
pub mod index;
pub mod manager;
pub mod model_manager;
pub mod registry;
pub mod short_term;

pub use embedder::OnnxEmbedder;
pub use index::{FlatIndex, SqliteCosineIndex, cosine_similarity};
pub use manager::MemoryManager;
pub use model_manager::{ModelManager, load_embedder};
pub use registry::MemoryRegistry;
pub use short_term::ShortTermMemory;
