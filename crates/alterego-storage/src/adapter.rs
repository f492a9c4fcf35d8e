// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`PersistentStore`] trait.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use alterego_config::model::StorageConfig;
use alterego_core::{
    AdapterType, AlterEgoError, EmbeddingAdapter, EntryKind, HealthStatus, MemoryRecord,
    NewRecord, PersistentStore, PluginAdapter, Turn, try_embed,
};

use crate::database::{Database, map_tr_err};
use crate::queries::entries::{self, PreparedEntry};
use crate::transcript::TranscriptFile;

/// SQLite-backed persistent store shared by every persona.
///
/// The database is opened by [`SqliteStore::open`]; every persona lives in
/// the same file, partitioned by the `persona` column. When an embedder is
/// injected, searchable records are embedded before the insert so the text
/// and its vector commit together.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
}

impl SqliteStore {
    /// The connection is not opened until [`SqliteStore::open`] is called.
    pub fn new(config: StorageConfig, embedder: Option<Arc<dyn EmbeddingAdapter>>) -> Self {
        Self {
            config,
            db: OnceCell::new(),
            embedder,
        }
    }

    /// Opens the database and runs migrations.
    pub async fn open(&self) -> Result<(), AlterEgoError> {
        let path = self.config.database_path.clone();
        let wal = self.config.wal_mode;
        self.db
            .get_or_try_init(|| async move { Database::open_with(&path, wal).await })
            .await?;
        debug!(path = %self.config.database_path, "SQLite store opened");
        Ok(())
    }

    /// Checkpoints the WAL. The connection closes when the store is dropped.
    pub async fn close(&self) -> Result<(), AlterEgoError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    fn db(&self) -> Result<&Database, AlterEgoError> {
        self.db.get().ok_or_else(|| AlterEgoError::Storage {
            source: "store not opened -- call open() first".into(),
        })
    }

    fn transcript_file(&self, persona: &str) -> Option<TranscriptFile> {
        self.config
            .export_transcript_json
            .then(|| TranscriptFile::for_persona(&PathBuf::from(&self.config.data_dir), persona))
    }

    /// Summaries are never searched, so they are stored without a vector.
    async fn prepare(&self, record: NewRecord) -> PreparedEntry {
        let embedding = match record.kind {
            EntryKind::Summary => None,
            _ => try_embed(self.embedder.as_deref(), &record.turn.content).await,
        };
        PreparedEntry { record, embedding }
    }

    /// Mirrors committed conversation turns to the JSON export.
    ///
    /// A failed export is logged only; SQLite already holds the turns.
    async fn export(&self, persona: &str, records: &[MemoryRecord]) {
        let Some(file) = self.transcript_file(persona) else {
            return;
        };
        let turns: Vec<Turn> = records
            .iter()
            .filter(|r| r.kind == EntryKind::Conversation)
            .map(|r| r.turn.clone())
            .collect();
        if turns.is_empty() {
            return;
        }
        let result = tokio::task::spawn_blocking(move || file.append(&turns)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(persona, error = %e, "transcript export failed"),
            Err(e) => warn!(persona, error = %e, "transcript export task failed"),
        }
    }

    /// Rewrites the export from the database when it is missing, corrupt,
    /// or no longer matches the committed conversation.
    async fn repair_export(&self, persona: &str) -> Result<(), AlterEgoError> {
        let Some(file) = self.transcript_file(persona) else {
            return Ok(());
        };
        let turns = self.read_transcript(persona, None).await?;
        let probe = file.clone();
        let exported = tokio::task::spawn_blocking(move || probe.try_load())
            .await
            .map_err(|e| AlterEgoError::Internal(format!("transcript probe failed: {e}")))?;
        let in_step = match exported {
            Ok(Some(existing)) => existing == turns,
            Ok(None) => false,
            Err(e) => {
                warn!(path = %file.path().display(), error = %e, "corrupt transcript export, rebuilding");
                false
            }
        };

        if !in_step {
            debug!(persona, turns = turns.len(), "rewriting transcript export");
            tokio::task::spawn_blocking(move || file.write_all(&turns))
                .await
                .map_err(|e| AlterEgoError::Internal(format!("transcript rewrite failed: {e}")))??;
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        if self.embedder.is_none() {
            return Ok(HealthStatus::Degraded(
                "no embedding model, similarity search disabled".into(),
            ));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn initialize(&self, persona: &str) -> Result<(), AlterEgoError> {
        let db = self.db()?;
        entries::ensure_persona(db, persona).await?;
        self.repair_export(persona).await?;
        debug!(persona, "persona namespace ready");
        Ok(())
    }

    async fn append(&self, persona: &str, record: NewRecord) -> Result<MemoryRecord, AlterEgoError> {
        let mut records = self.append_batch(persona, vec![record]).await?;
        records
            .pop()
            .ok_or_else(|| AlterEgoError::Internal("insert returned no record".into()))
    }

    async fn append_batch(
        &self,
        persona: &str,
        records: Vec<NewRecord>,
    ) -> Result<Vec<MemoryRecord>, AlterEgoError> {
        let db = self.db()?;
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            prepared.push(self.prepare(record).await);
        }
        let inserted = entries::insert_entries(db, persona, prepared).await?;
        debug!(
            persona,
            count = inserted.len(),
            first_id = inserted.first().map(|r| r.id),
            "memory records committed"
        );
        self.export(persona, &inserted).await;
        Ok(inserted)
    }

    async fn read_transcript(
        &self,
        persona: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Turn>, AlterEgoError> {
        let rows = entries::get_conversation(self.db()?, persona, limit).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_record())
            .map(|record| record.turn)
            .collect())
    }

    async fn read_all_embedded(&self, persona: &str) -> Result<Vec<MemoryRecord>, AlterEgoError> {
        let rows = entries::get_embedded(self.db()?, persona).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_record())
            .filter(|record| record.embedding.is_some())
            .collect())
    }

    async fn latest_summary(&self, persona: &str) -> Result<Option<MemoryRecord>, AlterEgoError> {
        let row = entries::get_latest_of_kind(self.db()?, persona, EntryKind::Summary).await?;
        Ok(row.and_then(|row| row.into_record()))
    }

    async fn clear(&self, persona: &str) -> Result<(), AlterEgoError> {
        let deleted = entries::delete_persona_entries(self.db()?, persona).await?;
        if let Some(file) = self.transcript_file(persona) {
            tokio::task::spawn_blocking(move || file.clear())
                .await
                .map_err(|e| AlterEgoError::Internal(format!("transcript clear failed: {e}")))??;
        }
        debug!(persona, deleted, "persona memory cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alterego_core::{EmbeddingInput, EmbeddingOutput, Role};
    use tempfile::tempdir;

    /// Maps text length onto a two-dimensional unit vector.
    struct LengthEmbedder;

    #[async_trait]
    impl PluginAdapter for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 1)
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
    impl EmbeddingAdapter for LengthEmbedder {
        async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, AlterEgoError> {
            let embeddings = input
                .texts
                .iter()
                .map(|t| {
                    let x = t.len() as f32;
                    let norm = (x * x + 1.0).sqrt();
                    vec![x / norm, 1.0 / norm]
                })
                .collect();
            Ok(EmbeddingOutput {
                embeddings,
                dimensions: 2,
            })
        }
        fn dimensions(&self) -> usize {
            2
        }
    }

    fn make_config(dir: &std::path::Path, export: bool) -> StorageConfig {
        StorageConfig {
            database_path: dir.join("alterego.db").display().to_string(),
            data_dir: dir.display().to_string(),
            wal_mode: true,
            export_transcript_json: export,
        }
    }

    async fn open_store(
        dir: &std::path::Path,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
    ) -> SqliteStore {
        let store = SqliteStore::new(make_config(dir, true), embedder);
        store.open().await.unwrap();
        store
    }

    #[tokio::test]
    async fn operations_before_open_fail() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(dir.path(), false), None);
        assert!(store.initialize("p").await.is_err());
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path(), None).await;
        store.initialize("ALTER EGO").await.unwrap();
        store.initialize("ALTER EGO").await.unwrap();
        assert!(store.read_transcript("ALTER EGO", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_without_embedder_keeps_transcript_but_not_search() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path(), None).await;
        store.initialize("p").await.unwrap();
        let record = store
            .append("p", NewRecord::conversation(Turn::user("hello")))
            .await
            .unwrap();
        assert!(record.embedding.is_none());
        assert_eq!(store.read_transcript("p", None).await.unwrap().len(), 1);
        assert!(store.read_all_embedded("p").await.unwrap().is_empty());
        assert!(matches!(
            store.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }

    #[tokio::test]
    async fn append_with_embedder_stores_vector() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path(), Some(Arc::new(LengthEmbedder))).await;
        store.initialize("p").await.unwrap();
        let records = store
            .append_batch(
                "p",
                vec![
                    NewRecord::conversation(Turn::user("question")),
                    NewRecord::conversation(Turn::assistant("answer")),
                    NewRecord::summary("summary text"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].embedding.is_some());
        assert!(records[2].embedding.is_none());

        let embedded = store.read_all_embedded("p").await.unwrap();
        assert_eq!(embedded.len(), 2);
        assert_eq!(embedded[1].turn.role, Role::Assistant);
        let summary = store.latest_summary("p").await.unwrap().unwrap();
        assert_eq!(summary.turn.content, "summary text");
    }

    #[tokio::test]
    async fn export_mirrors_conversation_only() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path(), None).await;
        store.initialize("p").await.unwrap();
        store
            .append_batch(
                "p",
                vec![
                    NewRecord::conversation(Turn::user("q")),
                    NewRecord::conversation(Turn::assistant("r")),
                    NewRecord::note("not exported"),
                ],
            )
            .await
            .unwrap();

        let exported = TranscriptFile::for_persona(dir.path(), "p").load();
        let contents: Vec<&str> = exported.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q", "r"]);
    }

    #[tokio::test]
    async fn corrupt_export_is_rebuilt_on_initialize() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path(), None).await;
        store.initialize("p").await.unwrap();
        store
            .append("p", NewRecord::conversation(Turn::user("kept")))
            .await
            .unwrap();

        let file = TranscriptFile::for_persona(dir.path(), "p");
        std::fs::write(file.path(), "[{\"broken\":").unwrap();
        store.initialize("p").await.unwrap();

        let turns = file.load();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "kept");
    }

    #[tokio::test]
    async fn stale_export_is_reconciled_on_initialize() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path(), None).await;
        store.initialize("p").await.unwrap();
        store
            .append_batch(
                "p",
                vec![
                    NewRecord::conversation(Turn::user("q")),
                    NewRecord::conversation(Turn::assistant("r")),
                ],
            )
            .await
            .unwrap();

        // An export that missed the last write.
        let file = TranscriptFile::for_persona(dir.path(), "p");
        let mut stale = file.load();
        stale.pop();
        file.write_all(&stale).unwrap();

        store.initialize("p").await.unwrap();
        let contents: Vec<String> = file.load().into_iter().map(|t| t.content).collect();
        assert_eq!(contents, vec!["q", "r"]);
    }

    #[tokio::test]
    async fn clear_removes_records_and_export() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path(), Some(Arc::new(LengthEmbedder))).await;
        store.initialize("a").await.unwrap();
        store.initialize("b").await.unwrap();
        store
            .append("a", NewRecord::conversation(Turn::user("a1")))
            .await
            .unwrap();
        store
            .append("b", NewRecord::conversation(Turn::user("b1")))
            .await
            .unwrap();

        store.clear("a").await.unwrap();
        assert!(store.read_transcript("a", None).await.unwrap().is_empty());
        assert!(store.read_all_embedded("a").await.unwrap().is_empty());
        assert!(TranscriptFile::for_persona(dir.path(), "a").load().is_empty());
        assert_eq!(store.read_transcript("b", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path(), None).await;
            store.initialize("p").await.unwrap();
            for i in 0..4 {
                store
                    .append("p", NewRecord::conversation(Turn::user(format!("t{i}"))))
                    .await
                    .unwrap();
            }
            store.shutdown().await.unwrap();
        }
        let store = open_store(dir.path(), None).await;
        let tail = store.read_transcript("p", Some(2)).await.unwrap();
        let contents: Vec<&str> = tail.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["t2", "t3"]);
    }
}
