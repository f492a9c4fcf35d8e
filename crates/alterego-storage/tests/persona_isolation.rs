// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-persona files stay apart even when persona names sanitize alike.

use std::path::Path;

use alterego_config::model::StorageConfig;
use alterego_core::{NewRecord, PersistentStore, Turn};
use alterego_storage::{SqliteStore, TranscriptFile, persona_dir};

fn storage_config(dir: &Path) -> StorageConfig {
    StorageConfig {
        database_path: dir.join("memory.db").display().to_string(),
        data_dir: dir.join("data").display().to_string(),
        wal_mode: true,
        export_transcript_json: true,
    }
}

fn contents(turns: Vec<Turn>) -> Vec<String> {
    turns.into_iter().map(|t| t.content).collect()
}

#[tokio::test]
async fn look_alike_persona_sees_no_exported_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let store = SqliteStore::new(storage_config(dir.path()), None);
    store.open().await.unwrap();

    store.initialize("a/b").await.unwrap();
    store
        .append("a/b", NewRecord::conversation(Turn::user("my password is swordfish")))
        .await
        .unwrap();

    store.initialize("a_b").await.unwrap();
    assert_ne!(persona_dir(&data_dir, "a/b"), persona_dir(&data_dir, "a_b"));
    assert!(TranscriptFile::for_persona(&data_dir, "a_b").load().is_empty());
    assert!(store.read_transcript("a_b", None).await.unwrap().is_empty());

    // Clearing the look-alike leaves the original's export alone.
    store.clear("a_b").await.unwrap();
    assert_eq!(
        contents(TranscriptFile::for_persona(&data_dir, "a/b").load()),
        ["my password is swordfish"]
    );
    assert_eq!(
        contents(store.read_transcript("a/b", None).await.unwrap()),
        ["my password is swordfish"]
    );
}

#[tokio::test]
async fn padded_persona_name_gets_its_own_export() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let store = SqliteStore::new(storage_config(dir.path()), None);
    store.open().await.unwrap();

    store.initialize("Ada").await.unwrap();
    store
        .append("Ada", NewRecord::conversation(Turn::user("hello")))
        .await
        .unwrap();
    store.initialize(" Ada").await.unwrap();

    assert!(TranscriptFile::for_persona(&data_dir, " Ada").load().is_empty());
    assert_eq!(
        contents(TranscriptFile::for_persona(&data_dir, "Ada").load()),
        ["hello"]
    );
}
