// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chat_history.json` export for external readers such as a history viewer.
//!
//! The file is an ordered JSON array of `{timestamp, role, content}` objects.
//! SQLite stays the source of truth; this mirror is rewritten atomically
//! (temp file in the same directory, fsync, rename) after each append.

use std::io::Write;
use std::path::{Path, PathBuf};

use alterego_core::{AlterEgoError, Turn, persona_dir_name};
use tracing::warn;

/// File name of the exported transcript inside a persona directory.
pub const TRANSCRIPT_FILE: &str = "chat_history.json";

/// `<data_dir>/personas/<persona>`.
pub fn persona_dir(data_dir: &Path, persona: &str) -> PathBuf {
    data_dir.join("personas").join(persona_dir_name(persona))
}

/// Replaces `path` with `bytes` so readers see the old or the new content,
/// never a torn write. Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AlterEgoError> {
    let dir = path
        .parent()
        .ok_or_else(|| AlterEgoError::Internal(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(dir).map_err(AlterEgoError::storage)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(AlterEgoError::storage)?;
    tmp.write_all(bytes).map_err(AlterEgoError::storage)?;
    tmp.as_file().sync_all().map_err(AlterEgoError::storage)?;
    tmp.persist(path)
        .map_err(|e| AlterEgoError::storage(e.error))?;
    Ok(())
}

/// The JSON transcript of one persona.
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_persona(data_dir: &Path, persona: &str) -> Self {
        Self::new(persona_dir(data_dir, persona).join(TRANSCRIPT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the transcript. A missing file is empty.
    ///
    /// A file that is not a valid transcript is also treated as empty, with
    /// a warning, so one corrupt export never blocks the persona.
    pub fn load(&self) -> Vec<Turn> {
        match self.try_load() {
            Ok(Some(turns)) => turns,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt transcript file, treating as empty");
                Vec::new()
            }
        }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn try_load(&self) -> Result<Option<Vec<Turn>>, AlterEgoError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AlterEgoError::storage(e)),
        };
        if content.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(AlterEgoError::storage)
    }

    /// Appends turns to the existing transcript.
    pub fn append(&self, turns: &[Turn]) -> Result<(), AlterEgoError> {
        let mut all = self.load();
        all.extend_from_slice(turns);
        self.write_all(&all)
    }

    /// Replaces the transcript atomically.
    pub fn write_all(&self, turns: &[Turn]) -> Result<(), AlterEgoError> {
        let json = serde_json::to_vec_pretty(turns).map_err(AlterEgoError::storage)?;
        write_atomic(&self.path, &json)
    }

    /// Resets the transcript to an empty array.
    pub fn clear(&self) -> Result<(), AlterEgoError> {
        self.write_all(&[])
    }
}
