// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory entry CRUD operations.

use alterego_core::{AlterEgoError, EntryKind, MemoryRecord, NewRecord};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{ENTRY_COLUMNS, EntryRow, vec_to_blob};

/// A record ready for insertion, with its embedding already computed.
#[derive(Debug, Clone)]
pub struct PreparedEntry {
    pub record: NewRecord,
    pub embedding: Option<Vec<f32>>,
}

/// Registers a persona namespace. Existing personas are left untouched.
pub async fn ensure_persona(db: &Database, persona: &str) -> Result<(), AlterEgoError> {
    let persona = persona.to_string();
    let now = chrono_now();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO personas (name, created_at) VALUES (?1, ?2)",
                params![persona, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts entries in a single transaction and returns them with their ids.
///
/// Either every entry is committed or none is.
pub async fn insert_entries(
    db: &Database,
    persona: &str,
    entries: Vec<PreparedEntry>,
) -> Result<Vec<MemoryRecord>, AlterEgoError> {
    let persona = persona.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<MemoryRecord>, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO personas (name, created_at) VALUES (?1, ?2)",
                params![persona, chrono_now()],
            )?;
            let mut inserted = Vec::with_capacity(entries.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO memory_entries
                        (persona, kind, role, content, timestamp, embedding, importance)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for entry in entries {
                    let importance = entry.record.importance.clamp(0.0, 1.0);
                    let blob = entry.embedding.as_deref().map(vec_to_blob);
                    stmt.execute(params![
                        persona,
                        entry.record.kind.to_string(),
                        entry.record.turn.role.to_string(),
                        entry.record.turn.content,
                        entry.record.turn.timestamp,
                        blob,
                        importance as f64,
                    ])?;
                    inserted.push(MemoryRecord {
                        id: tx.last_insert_rowid(),
                        persona: persona.clone(),
                        kind: entry.record.kind,
                        turn: entry.record.turn,
                        importance,
                        embedding: entry.embedding,
                    });
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
        .map_err(map_tr_err)
}

/// Conversation entries in insertion order, optionally only the last `limit`.
pub async fn get_conversation(
    db: &Database,
    persona: &str,
    limit: Option<usize>,
) -> Result<Vec<EntryRow>, AlterEgoError> {
    let persona = persona.to_string();
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    db.connection()
        .call(move |conn| -> Result<Vec<EntryRow>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries
                 WHERE persona = ?1 AND kind = 'conversation'
                 ORDER BY id DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(params![persona, limit], EntryRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Searchable entries (conversation and notes) that carry an embedding.
pub async fn get_embedded(db: &Database, persona: &str) -> Result<Vec<EntryRow>, AlterEgoError> {
    let persona = persona.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<EntryRow>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries
                 WHERE persona = ?1 AND kind IN ('conversation', 'note')
                   AND embedding IS NOT NULL
                 ORDER BY id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![persona], EntryRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// The newest entry of the given kind.
pub async fn get_latest_of_kind(
    db: &Database,
    persona: &str,
    kind: EntryKind,
) -> Result<Option<EntryRow>, AlterEgoError> {
    let persona = persona.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<EntryRow>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries
                 WHERE persona = ?1 AND kind = ?2
                 ORDER BY id DESC LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query_map(params![persona, kind], EntryRow::from_row)?;
            let latest = rows.next().transpose()?;
            Ok(latest)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of entries of one kind for a persona.
pub async fn count_entries(
    db: &Database,
    persona: &str,
    kind: EntryKind,
) -> Result<usize, AlterEgoError> {
    let persona = persona.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM memory_entries WHERE persona = ?1 AND kind = ?2",
                params![persona, kind],
                |row| row.get(0),
            )
        })
        .await
        .map(|n| n.max(0) as usize)
        .map_err(map_tr_err)
}

/// Deletes every entry of a persona. The namespace itself stays registered.
pub async fn delete_persona_entries(db: &Database, persona: &str) -> Result<usize, AlterEgoError> {
    let persona = persona.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM memory_entries WHERE persona = ?1",
                params![persona],
            )
        })
        .await
        .map_err(map_tr_err)
}

fn chrono_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
