// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Alter Ego.
//!
//! One WAL-mode database holds every persona's memory entries, partitioned
//! by persona. Writes go through `tokio-rusqlite`'s single background thread,
//! commit with `synchronous = FULL`, and are mirrored to a per-persona
//! `chat_history.json` export.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod transcript;

pub use adapter::SqliteStore;
pub use database::Database;
pub use models::{blob_to_vec, vec_to_blob};
pub use transcript::{TRANSCRIPT_FILE, TranscriptFile, persona_dir, write_atomic};
