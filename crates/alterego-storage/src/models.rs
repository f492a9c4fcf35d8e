// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types and vector BLOB encoding.
//!
//! Embeddings are stored as little-endian `f32` BLOBs.

use std::str::FromStr;

use alterego_core::{EntryKind, MemoryRecord, Role, Turn};
use tracing::warn;

/// Serialize an f32 vector to a little-endian byte BLOB.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize a little-endian byte BLOB into an f32 vector.
///
/// Returns `None` when the length is not a multiple of four.
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// A `memory_entries` row exactly as SQLite returned it.
#[derive(Debug, Clone)]
pub struct EntryRow {
    pub id: i64,
    pub persona: String,
    pub kind: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
    pub embedding: Option<Vec<u8>>,
    pub importance: f64,
}

/// Columns selected by every entry query, in [`EntryRow`] order.
pub const ENTRY_COLUMNS: &str =
    "id, persona, kind, role, content, timestamp, embedding, importance";

impl EntryRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            persona: row.get(1)?,
            kind: row.get(2)?,
            role: row.get(3)?,
            content: row.get(4)?,
            timestamp: row.get(5)?,
            embedding: row.get(6)?,
            importance: row.get(7)?,
        })
    }

    /// Decodes the row. Unknown roles or kinds drop the row with a warning;
    /// a malformed vector keeps the row without its embedding.
    pub fn into_record(self) -> Option<MemoryRecord> {
        let role = match Role::from_str(&self.role) {
            Ok(role) => role,
            Err(_) => {
                warn!(id = self.id, role = %self.role, "skipping memory entry with unknown role");
                return None;
            }
        };
        let kind = match EntryKind::from_str(&self.kind) {
            Ok(kind) => kind,
            Err(_) => {
                warn!(id = self.id, kind = %self.kind, "skipping memory entry with unknown kind");
                return None;
            }
        };
        let embedding = match self.embedding {
            Some(blob) => {
                let decoded = blob_to_vec(&blob);
                if decoded.is_none() {
                    warn!(id = self.id, len = blob.len(), "ignoring malformed embedding blob");
                }
                decoded
            }
            None => None,
        };
        Some(MemoryRecord {
            id: self.id,
            persona: self.persona,
            kind,
            turn: Turn {
                timestamp: self.timestamp,
                role,
                content: self.content,
            },
            importance: self.importance as f32,
            embedding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str, kind: &str, embedding: Option<Vec<u8>>) -> EntryRow {
        EntryRow {
            id: 7,
            persona: "p".into(),
            kind: kind.into(),
            role: role.into(),
            content: "hello".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            embedding,
            importance: 0.5,
        }
    }

    #[test]
    fn blob_round_trip_preserves_values() {
        let original = vec![1.0f32, -2.5, 0.0, f32::MAX];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob).unwrap(), original);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(blob_to_vec(&[0, 0, 128]).is_none());
        assert_eq!(blob_to_vec(&[]).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn row_decodes_into_record() {
        let record = row("assistant", "conversation", Some(vec_to_blob(&[0.5, 0.5])))
            .into_record()
            .unwrap();
        assert_eq!(record.turn.role, Role::Assistant);
        assert_eq!(record.kind, EntryKind::Conversation);
        assert_eq!(record.embedding, Some(vec![0.5, 0.5]));
        assert!((record.importance - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn malformed_embedding_keeps_text() {
        let record = row("user", "note", Some(vec![1, 2, 3])).into_record().unwrap();
        assert!(record.embedding.is_none());
        assert_eq!(record.turn.content, "hello");
    }

    #[test]
    fn unknown_role_drops_row() {
        assert!(row("narrator", "conversation", None).into_record().is_none());
        assert!(row("user", "diary", None).into_record().is_none());
    }
}
