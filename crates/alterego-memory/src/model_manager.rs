// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-run download of the ONNX embedding model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alterego_config::model::MemoryConfig;
use alterego_core::{AlterEgoError, EmbeddingAdapter};
use tracing::{info, warn};

use crate::embedder::OnnxEmbedder;

const HF_BASE: &str = "https://huggingface.co/sentence-transformers";

/// Resolves and downloads model files under `<data_dir>/models/<model_name>`.
pub struct ModelManager {
    data_dir: PathBuf,
    model_name: String,
    base_url: String,
}

impl ModelManager {
    pub fn new(data_dir: PathBuf, model_name: &str) -> Self {
        Self {
            data_dir,
            model_name: model_name.to_string(),
            base_url: HF_BASE.to_string(),
        }
    }

    /// Overrides the download host (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join(&self.model_name)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join("model.onnx")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir().join("tokenizer.json")
    }

    pub fn is_model_available(&self) -> bool {
        self.model_path().exists() && self.tokenizer_path().exists()
    }

    fn file_urls(&self) -> [(&'static str, String); 2] {
        let repo = format!("{}/{}/resolve/main", self.base_url, self.model_name);
        [
            ("model.onnx", format!("{repo}/onnx/model.onnx")),
            ("tokenizer.json", format!("{repo}/tokenizer.json")),
        ]
    }

    /// Downloads any missing file and returns the model path.
    pub async fn ensure_model(&self) -> Result<PathBuf, AlterEgoError> {
        if self.is_model_available() {
            return Ok(self.model_path());
        }

        info!(model = %self.model_name, "embedding model not found, downloading");
        let model_dir = self.model_dir();
        tokio::fs::create_dir_all(&model_dir)
            .await
            .map_err(AlterEgoError::storage)?;

        for (filename, url) in self.file_urls() {
            let dest = model_dir.join(filename);
            if dest.exists() {
                continue;
            }
            let size = download_file(&url, &dest).await?;
            info!(file = filename, bytes = size, "downloaded model file");
        }

        info!(path = %model_dir.display(), "embedding model ready");
        Ok(self.model_path())
    }
}

/// Downloads to a `.part` file and renames it, so an interrupted download
/// never looks like a complete model.
async fn download_file(url: &str, dest: &Path) -> Result<usize, AlterEgoError> {
    let download_err = |e: &dyn std::fmt::Display| AlterEgoError::Embedding {
        message: format!("failed to download {url}: {e}"),
    };

    let response = reqwest::get(url).await.map_err(|e| download_err(&e))?;
    if !response.status().is_success() {
        return Err(download_err(&response.status()));
    }
    let bytes = response.bytes().await.map_err(|e| download_err(&e))?;

    let partial = dest.with_extension("part");
    if let Err(e) = tokio::fs::write(&partial, &bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(AlterEgoError::storage(e));
    }
    tokio::fs::rename(&partial, dest)
        .await
        .map_err(AlterEgoError::storage)?;
    Ok(bytes.len())
}

/// Loads the configured embedder, or `None` when embeddings are disabled or
/// the model cannot be provisioned. A failure is reported once here and the
/// rest of the system runs without similarity search.
pub async fn load_embedder(
    config: &MemoryConfig,
    data_dir: &Path,
) -> Option<Arc<dyn EmbeddingAdapter>> {
    if !config.embeddings {
        info!("embeddings disabled, similarity search off");
        return None;
    }
    let manager = ModelManager::new(data_dir.to_path_buf(), &config.model_name);
    let result = match manager.ensure_model().await {
        Ok(path) => OnnxEmbedder::new(&path, &config.model_name),
        Err(e) => Err(e),
    };
    match result {
        Ok(embedder) => {
            info!(model = %config.model_name, "embedding model loaded");
            Some(Arc::new(embedder))
        }
        Err(e) => {
            warn!(model = %config.model_name, error = %e, "embedding model unavailable, similarity search disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_data_dir() {
        let mgr = ModelManager::new(PathBuf::from("/data"), "all-MiniLM-L6-v2");
        assert_eq!(
            mgr.model_path(),
            PathBuf::from("/data/models/all-MiniLM-L6-v2/model.onnx")
        );
        assert_eq!(
            mgr.tokenizer_path(),
            PathBuf::from("/data/models/all-MiniLM-L6-v2/tokenizer.json")
        );
    }

    #[test]
    fn urls_follow_model_name() {
        let mgr = ModelManager::new(PathBuf::from("/data"), "m").with_base_url("http://mirror");
        let urls = mgr.file_urls();
        assert_eq!(urls[0].1, "http://mirror/m/resolve/main/onnx/model.onnx");
        assert_eq!(urls[1].1, "http://mirror/m/resolve/main/tokenizer.json");
    }

    #[test]
    fn model_not_available_when_missing() {
        let mgr = ModelManager::new(PathBuf::from("/nonexistent/path"), "m");
        assert!(!mgr.is_model_available());
    }

    #[tokio::test]
    async fn disabled_embeddings_load_nothing() {
        let config = MemoryConfig {
            embeddings: false,
            ..MemoryConfig::default()
        };
        assert!(load_embedder(&config, Path::new("/nonexistent")).await.is_none());
    }

    #[tokio::test]
    async fn failed_download_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        // Unroutable host: the download fails and the loader absorbs it.
        let mgr = ModelManager::new(dir.path().to_path_buf(), "m").with_base_url("http://127.0.0.1:9");
        assert!(mgr.ensure_model().await.is_err());
        assert!(!mgr.is_model_available());
    }
}
