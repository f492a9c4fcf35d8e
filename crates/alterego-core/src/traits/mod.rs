// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch. [`VectorIndex`] is per-persona state rather than a
//! plugin, so it stands alone.

pub mod adapter;
pub mod backend;
pub mod embedding;
pub mod index;
pub mod storage;

pub use adapter::PluginAdapter;
pub use backend::GenerationBackend;
pub use embedding::{EmbeddingAdapter, embed_one, try_embed};
pub use index::VectorIndex;
pub use storage::PersistentStore;
