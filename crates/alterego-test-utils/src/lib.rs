// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Alter Ego integration tests.
//!
//! Deterministic stand-ins for the embedding model, the generation
//! backends and the store, plus a harness that builds a fresh
//! [`alterego_agent::AgentContext`] in a temporary directory.
//!
//! # Components
//!
//! - [`MockBackend`] - scripted generation backend that records prompts
//! - [`HashEmbedder`] / [`TableEmbedder`] - deterministic embedders
//! - [`FlakyStore`] - store wrapper whose writes can be made to fail
//! - [`TestHarness`] - agent context over a temp SQLite database

pub mod embedders;
pub mod flaky_store;
pub mod harness;
pub mod mock_backend;

pub use embedders::{HashEmbedder, TableEmbedder};
pub use flaky_store::FlakyStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_backend::MockBackend;
