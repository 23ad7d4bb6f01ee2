//! Filesystem model store.
//!
//! Raw uploads are kept under the upload directory as `<millis><ext>`; the
//! converted glTF is written to the models directory as `<millis>.gltf` and
//! served statically under `/models/`.
//!
//! Names are derived from the wall clock at millisecond granularity only, so
//! two uploads landing in the same millisecond overwrite each other. Files
//! are never cleaned up.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;
use crate::format::{extension_of, Document};

/// URL prefix under which converted models are served.
pub const MODELS_URL_PREFIX: &str = "/models";

/// A raw upload persisted to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Location of the raw file
    pub path: PathBuf,

    /// Timestamp stem shared by the raw file and its converted model
    pub stem: String,
}

/// Upload and converted-model directories.
#[derive(Debug, Clone)]
pub struct ModelStore {
    upload_dir: PathBuf,
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new(upload_dir: impl Into<PathBuf>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            models_dir: models_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Create both directories if they do not exist yet.
    pub async fn ensure_dirs(&self) -> Result<(), StoreError> {
        create_dir(&self.upload_dir).await?;
        create_dir(&self.models_dir).await
    }

    /// Write a raw upload, keeping the original (lowercased) extension.
    pub async fn save_upload(
        &self,
        original_name: &str,
        data: &[u8],
    ) -> Result<StoredUpload, StoreError> {
        let stem = chrono::Utc::now().timestamp_millis().to_string();
        let path = self
            .upload_dir
            .join(format!("{}{}", stem, extension_of(original_name)));

        create_dir(&self.upload_dir).await?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| io_error("write", &path, source))?;

        debug!(path = %path.display(), bytes = data.len(), "Saved upload");
        Ok(StoredUpload { path, stem })
    }

    /// Serialize a converted document and return its public URL.
    pub async fn write_model(&self, stem: &str, document: &Document) -> Result<String, StoreError> {
        let file_name = format!("{}.gltf", stem);
        let path = self.models_dir.join(&file_name);
        let json =
            serde_json::to_vec(document).map_err(|e| StoreError::Serialize(e.to_string()))?;

        create_dir(&self.models_dir).await?;
        tokio::fs::write(&path, &json)
            .await
            .map_err(|source| io_error("write", &path, source))?;

        debug!(path = %path.display(), bytes = json.len(), "Wrote model");
        Ok(model_url(&file_name))
    }
}

/// Public URL of a file in the models directory.
pub fn model_url(file_name: &str) -> String {
    format!("{}/{}", MODELS_URL_PREFIX, file_name)
}

async fn create_dir(path: &Path) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| io_error("create directory", path, source))
}

fn io_error(action: &'static str, path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        action,
        path: path.display().to_string(),
        source,
    }
}

// =============================================================================
// Tests
// =============================================================================
