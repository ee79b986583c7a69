use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A file present in the store directory.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
}

impl StoredFile {
    pub(crate) fn from_metadata(name: String, path: PathBuf, metadata: &std::fs::Metadata) -> Self {
        let timestamp = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Self {
            name,
            size_bytes: metadata.len(),
            created_at: timestamp,
            path,
        }
    }
}

/// Caller-declared attributes of an incoming upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    /// Size announced by the client, when known before the body is read.
    pub declared_size: Option<u64>,
    pub overwrite: bool,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            declared_size: None,
            overwrite: false,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub file_count: u64,
    pub total_bytes: u64,
    pub storage_path: PathBuf,
}
