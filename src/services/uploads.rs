//! Temporary upload storage
//!
//! Incoming file parts are written to the upload directory before ingestion
//! and removed once the provider has accepted them. Files are stored under a
//! unique name to avoid collisions between concurrent requests; the original
//! name is kept alongside for the provider upload.

use crate::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// A file saved to the upload directory for the duration of one request
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Location on local disk
    pub path: PathBuf,
    /// Name the caller gave the file, forwarded to the provider
    pub original_name: String,
}

/// Upload directory handle
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the upload directory if it does not exist
    pub async fn ensure_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(AppError::UploadWrite)
    }

    /// Write one uploaded file part to disk
    ///
    /// The on-disk name is a UUID with the original extension so that two
    /// requests uploading `report.pdf` at the same time cannot clobber each
    /// other.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredUpload, AppError> {
        self.ensure_dir().await?;

        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        let unique_name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        let path = self.dir.join(unique_name);

        fs::write(&path, data).await.map_err(AppError::UploadWrite)?;

        Ok(StoredUpload {
            path,
            original_name: original_name.to_string(),
        })
    }
}

/// Best-effort removal of stored uploads
///
/// Files already removed after a successful ingestion are skipped silently;
/// any other removal failure is logged and otherwise ignored.
pub async fn cleanup(uploads: &[StoredUpload]) {
    for upload in uploads {
        match fs::remove_file(&upload.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    path = %upload.path.display(),
                    error = %e,
                    "Failed to remove temp upload"
                );
            }
        }
    }
}
