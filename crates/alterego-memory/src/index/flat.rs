// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exact L2 index persisted as a binary snapshot plus a JSON sidecar.
//!
//! Files live in the persona directory:
//!
//! - `doc_store.json`: `{version, dimensions, checksum, entries: {id: {text}}}`.
//!   The source of truth for which entries exist.
//! - `index.bin`: `"AEIX"`, version `u32`, dimensions `u32`, count `u64`,
//!   the sidecar checksum (32 bytes), then `count` records of id `i64`
//!   followed by `dimensions` `f32`s. All little-endian.
//!
//! Every mutation rewrites the sidecar first and the snapshot second, each
//! atomically. A crash in between leaves a snapshot whose checksum no longer
//! matches the sidecar; on load that snapshot is discarded and vectors are
//! re-embedded from the sidecar text.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use alterego_core::{
    AlterEgoError, EmbeddingAdapter, MemoryRecord, ScoreKind, SearchResult, VectorIndex, try_embed,
};
use alterego_storage::{persona_dir, write_atomic};

use super::l2_squared;

pub const SNAPSHOT_FILE: &str = "index.bin";
pub const SIDECAR_FILE: &str = "doc_store.json";

const MAGIC: &[u8; 4] = b"AEIX";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    version: u32,
    dimensions: Option<usize>,
    checksum: String,
    entries: BTreeMap<i64, SidecarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SidecarEntry {
    text: String,
}

#[derive(Debug, Clone)]
struct FlatEntry {
    text: String,
    vector: Option<Vec<f32>>,
}

#[derive(Debug, Default)]
struct FlatState {
    entries: BTreeMap<i64, FlatEntry>,
    dimensions: Option<usize>,
}

impl FlatState {
    fn next_id(&self) -> i64 {
        self.entries.keys().next_back().map_or(1, |max| max + 1)
    }

    fn checksum(&self) -> [u8; 32] {
        text_checksum(self.entries.iter().map(|(id, e)| (*id, e.text.as_str())))
    }

    fn sidecar_bytes(&self) -> Result<Vec<u8>, AlterEgoError> {
        let sidecar = Sidecar {
            version: FORMAT_VERSION,
            dimensions: self.dimensions,
            checksum: hex::encode(self.checksum()),
            entries: self
                .entries
                .iter()
                .map(|(id, e)| (*id, SidecarEntry { text: e.text.clone() }))
                .collect(),
        };
        serde_json::to_vec_pretty(&sidecar).map_err(AlterEgoError::storage)
    }

    fn snapshot_bytes(&self) -> Vec<u8> {
        let dim = self.dimensions.unwrap_or(0);
        let vectors: Vec<(i64, &[f32])> = self
            .entries
            .iter()
            .filter_map(|(id, e)| e.vector.as_deref().map(|v| (*id, v)))
            .filter(|(_, v)| v.len() == dim)
            .collect();

        let mut buf = Vec::with_capacity(52 + vectors.len() * (8 + dim * 4));
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(dim as u32).to_le_bytes());
        buf.extend_from_slice(&(vectors.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.checksum());
        for (id, vector) in vectors {
            buf.extend_from_slice(&id.to_le_bytes());
            for value in vector {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        buf
    }
}

fn text_checksum<'a>(entries: impl Iterator<Item = (i64, &'a str)>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for (id, text) in entries {
        hasher.update(id.to_le_bytes());
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().into()
}

/// Persona-scoped exact nearest-neighbour index.
pub struct FlatIndex {
    persona: String,
    dir: PathBuf,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    state: Mutex<FlatState>,
}

impl FlatIndex {
    /// Loads the index for `persona` from `<data_dir>/personas/<persona>/`.
    ///
    /// Unreadable files never fail the open: a corrupt sidecar resets the
    /// index to empty, a corrupt or stale snapshot triggers re-embedding.
    pub async fn open(
        persona: &str,
        data_dir: &Path,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
    ) -> Result<Self, AlterEgoError> {
        let dir = persona_dir(data_dir, persona);
        let load_dir = dir.clone();
        let (mut state, snapshot_stale) = tokio::task::spawn_blocking(move || load_files(&load_dir))
            .await
            .map_err(|e| AlterEgoError::Internal(format!("index load task failed: {e}")))?;

        let index = Self {
            persona: persona.to_string(),
            dir,
            embedder,
            state: Mutex::new(FlatState::default()),
        };

        let mut rebuilt = 0usize;
        if index.embedder.is_some() {
            for entry in state.entries.values_mut() {
                if entry.vector.is_none() {
                    entry.vector = index.embed(&entry.text).await;
                    if entry.vector.is_some() {
                        rebuilt += 1;
                    }
                }
            }
            if state.dimensions.is_none() {
                state.dimensions = state
                    .entries
                    .values()
                    .find_map(|e| e.vector.as_ref().map(Vec::len));
            }
        }

        let entries = state.entries.len();
        *index.state.lock().await = state;
        if rebuilt > 0 || snapshot_stale {
            let state = index.state.lock().await;
            index.persist(&state).await?;
        }
        info!(persona, entries, rebuilt, "flat index loaded");
        Ok(index)
    }

    /// Number of stored entries, with or without a vector.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of entries that take part in search.
    pub async fn vector_count(&self) -> usize {
        self.state
            .lock()
            .await
            .entries
            .values()
            .filter(|e| e.vector.is_some())
            .count()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.dir.join(SIDECAR_FILE)
    }

    async fn persist(&self, state: &FlatState) -> Result<(), AlterEgoError> {
        let sidecar = state.sidecar_bytes()?;
        let snapshot = state.snapshot_bytes();
        let sidecar_path = self.sidecar_path();
        let snapshot_path = self.snapshot_path();
        tokio::task::spawn_blocking(move || -> Result<(), AlterEgoError> {
            write_atomic(&sidecar_path, &sidecar)?;
            write_atomic(&snapshot_path, &snapshot)
        })
        .await
        .map_err(|e| AlterEgoError::Internal(format!("index write task failed: {e}")))?
    }

    async fn insert(&self, text: &str, vector: Option<Vec<f32>>) -> Result<i64, AlterEgoError> {
        let mut state = self.state.lock().await;
        let vector = match (vector, state.dimensions) {
            (Some(v), Some(dim)) if v.len() != dim => {
                warn!(persona = %self.persona, expected = dim, got = v.len(), "embedding dimension mismatch, storing without vector");
                None
            }
            (v, _) => v,
        };
        if state.dimensions.is_none() {
            state.dimensions = vector.as_ref().map(Vec::len);
        }

        let id = state.next_id();
        state.entries.insert(
            id,
            FlatEntry {
                text: text.to_string(),
                vector,
            },
        );
        if let Err(e) = self.persist(&state).await {
            state.entries.remove(&id);
            return Err(e);
        }
        debug!(persona = %self.persona, id, "flat index entry added");
        Ok(id)
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Distance
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        try_embed(self.embedder.as_deref(), text).await
    }

    async fn add(&self, text: &str) -> Result<i64, AlterEgoError> {
        let vector = self.embed(text).await;
        self.insert(text, vector).await
    }

    async fn index_record(&self, record: &MemoryRecord) -> Result<i64, AlterEgoError> {
        let vector = match &record.embedding {
            Some(v) => Some(v.clone()),
            None => self.embed(&record.turn.content).await,
        };
        self.insert(&record.turn.content, vector).await
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, AlterEgoError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(query_vec) = self.embed(query).await else {
            return Ok(Vec::new());
        };

        let state = self.state.lock().await;
        let mut results: Vec<SearchResult> = state
            .entries
            .iter()
            .filter_map(|(id, entry)| {
                let vector = entry.vector.as_deref()?;
                (vector.len() == query_vec.len()).then(|| SearchResult {
                    text: entry.text.clone(),
                    score: l2_squared(&query_vec, vector),
                    record_id: *id,
                    kind: ScoreKind::Distance,
                })
            })
            .collect();
        drop(state);

        ScoreKind::Distance.sort(&mut results);
        results.truncate(k);
        Ok(results)
    }

    async fn reset(&self) -> Result<(), AlterEgoError> {
        let mut state = self.state.lock().await;
        *state = FlatState::default();
        self.persist(&state).await?;
        debug!(persona = %self.persona, "flat index reset");
        Ok(())
    }
}

/// Reads both files. The flag reports a snapshot that exists but could not
/// be used, so the caller rewrites it.
fn load_files(dir: &Path) -> (FlatState, bool) {
    let sidecar_path = dir.join(SIDECAR_FILE);
    let sidecar = match std::fs::read(&sidecar_path) {
        Ok(bytes) => match serde_json::from_slice::<Sidecar>(&bytes) {
            Ok(s) if s.version == FORMAT_VERSION => Some(s),
            Ok(s) => {
                warn!(path = %sidecar_path.display(), version = s.version, "unsupported index sidecar version, starting empty");
                None
            }
            Err(e) => {
                warn!(path = %sidecar_path.display(), error = %e, "corrupt index sidecar, starting empty");
                None
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %sidecar_path.display(), error = %e, "unreadable index sidecar, starting empty");
            None
        }
    };

    let snapshot_path = dir.join(SNAPSHOT_FILE);
    let snapshot_exists = snapshot_path.exists();

    let Some(sidecar) = sidecar else {
        return (FlatState::default(), snapshot_exists);
    };

    let mut state = FlatState {
        entries: sidecar
            .entries
            .into_iter()
            .map(|(id, e)| {
                (
                    id,
                    FlatEntry {
                        text: e.text,
                        vector: None,
                    },
                )
            })
            .collect(),
        dimensions: sidecar.dimensions,
    };

    if !snapshot_exists {
        return (state, false);
    }
    let decoded = std::fs::read(&snapshot_path)
        .ok()
        .and_then(|bytes| decode_snapshot(&bytes));
    match decoded {
        Some(snapshot) if snapshot.checksum == state.checksum() => {
            if snapshot.dimensions > 0 {
                state.dimensions = Some(snapshot.dimensions);
            }
            for (id, vector) in snapshot.vectors {
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.vector = Some(vector);
                }
            }
            (state, false)
        }
        Some(_) => {
            warn!(path = %snapshot_path.display(), "index snapshot is stale, rebuilding from sidecar");
            (state, true)
        }
        None => {
            warn!(path = %snapshot_path.display(), "corrupt index snapshot, rebuilding from sidecar");
            (state, true)
        }
    }
}

struct Snapshot {
    dimensions: usize,
    checksum: [u8; 32],
    vectors: Vec<(i64, Vec<f32>)>,
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    if buf.len() < n {
        return None;
    }
    let (head, rest) = buf.split_at(n);
    *buf = rest;
    Some(head)
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> Option<[u8; N]> {
    take(buf, N)?.try_into().ok()
}

fn decode_snapshot(bytes: &[u8]) -> Option<Snapshot> {
    let mut buf = bytes;
    if take(&mut buf, 4)? != MAGIC {
        return None;
    }
    if u32::from_le_bytes(take_array(&mut buf)?) != FORMAT_VERSION {
        return None;
    }
    let dimensions = u32::from_le_bytes(take_array(&mut buf)?) as usize;
    let count = u64::from_le_bytes(take_array(&mut buf)?) as usize;
    let checksum: [u8; 32] = take_array(&mut buf)?;

    let record_len = 8 + dimensions * 4;
    if buf.len() != count.checked_mul(record_len)? {
        return None;
    }
    let mut vectors = Vec::with_capacity(count);
    for _ in 0..count {
        let id = i64::from_le_bytes(take_array(&mut buf)?);
        let mut vector = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            vector.push(f32::from_le_bytes(take_array(&mut buf)?));
        }
        vectors.push((id, vector));
    }
    Some(Snapshot {
        dimensions,
        checksum,
        vectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(entries: &[(i64, &str, Option<Vec<f32>>)]) -> FlatState {
        FlatState {
            entries: entries
                .iter()
                .map(|(id, text, vector)| {
                    (
                        *id,
                        FlatEntry {
                            text: text.to_string(),
                            vector: vector.clone(),
                        },
                    )
                })
                .collect(),
            dimensions: Some(2),
        }
    }

    #[test]
    fn snapshot_decodes_what_it_encodes() {
        let state = state_with(&[(1, "a", Some(vec![1.0, 2.0])), (2, "b", None), (5, "c", Some(vec![-1.0, 0.5]))]);
        let snapshot = decode_snapshot(&state.snapshot_bytes()).unwrap();
        assert_eq!(snapshot.dimensions, 2);
        assert_eq!(snapshot.checksum, state.checksum());
        assert_eq!(
            snapshot.vectors,
            vec![(1, vec![1.0, 2.0]), (5, vec![-1.0, 0.5])]
        );
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let state = state_with(&[(1, "a", Some(vec![1.0, 2.0]))]);
        let bytes = state.snapshot_bytes();
        assert!(decode_snapshot(&bytes[..bytes.len() - 1]).is_none());
        assert!(decode_snapshot(b"NOPE").is_none());
        assert!(decode_snapshot(&[]).is_none());
    }

    #[test]
    fn checksum_tracks_text_and_ids() {
        let a = state_with(&[(1, "a", None)]).checksum();
        assert_eq!(a, state_with(&[(1, "a", Some(vec![0.0, 0.0]))]).checksum());
        assert_ne!(a, state_with(&[(1, "b", None)]).checksum());
        assert_ne!(a, state_with(&[(2, "a", None)]).checksum());
    }

    #[test]
    fn next_id_follows_max() {
        assert_eq!(FlatState::default().next_id(), 1);
        assert_eq!(state_with(&[(3, "a", None), (9, "b", None)]).next_id(), 10);
    }

    #[test]
    fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (state, stale) = load_files(dir.path());
        assert!(state.entries.is_empty());
        assert!(!stale);
    }
}
