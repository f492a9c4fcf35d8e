// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use alterego_core::AlterEgoError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> AlterEgoError {
    AlterEgoError::storage(e)
}

/// Handle to the single SQLite writer.
pub struct Database {
    conn: Connection,
    path: String,
}

impl Database {
    /// Opens (creating if needed) the database file, applies PRAGMAs and
    /// runs pending migrations.
    ///
    /// Migrations run on a short-lived blocking connection first so refinery
    /// can own it mutably; the long-lived async connection is opened after.
    pub async fn open(path: &str) -> Result<Self, AlterEgoError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`] but lets the caller turn WAL off.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, AlterEgoError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(AlterEgoError::storage)?;
            }
        }

        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), AlterEgoError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(AlterEgoError::storage)?;
            apply_pragmas(&conn, wal_mode).map_err(AlterEgoError::storage)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| AlterEgoError::Internal(format!("migration task failed: {e}")))??;

        let conn = Connection::open(path).await.map_err(AlterEgoError::storage)?;
        conn.call(move |conn| -> Result<(), rusqlite::Error> { apply_pragmas(conn, wal_mode) })
            .await
            .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoints the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), AlterEgoError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoints and closes the connection.
    pub async fn close(self) -> Result<(), AlterEgoError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// `synchronous = FULL` makes every commit durable before the call returns.
fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(mode = %mode, "WAL mode unavailable, using fallback journal");
        }
    }
    conn.execute_batch(
        "PRAGMA synchronous = FULL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}
