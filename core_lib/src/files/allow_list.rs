//! Runtime-mutable allow-list of MIME types accepted for upload.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use super::validation::ValidationError;

/// Types accepted when no explicit list is configured.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/svg+xml",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

/// Shared set of permitted MIME types. Clones observe the same set.
#[derive(Clone, Debug)]
pub struct AllowedMimeTypes {
    inner: Arc<RwLock<BTreeSet<String>>>,
}

impl Default for AllowedMimeTypes {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_MIME_TYPES.iter().copied())
    }
}

impl AllowedMimeTypes {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = types
            .into_iter()
            .map(|t| normalize(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            inner: Arc::new(RwLock::new(set)),
        }
    }

    /// Adds a type. Returns `true` if it was not already present.
    pub fn allow(&self, mime_type: &str) -> Result<bool, ValidationError> {
        let normalized = normalize(mime_type);
        if normalized.is_empty() {
            return Err(ValidationError::EmptyMimeType);
        }

        let parsed: ::mime::Mime = normalized
            .parse()
            .map_err(|_| ValidationError::InvalidMimeType {
                mime_type: mime_type.trim().to_string(),
            })?;
        let essence = parsed.essence_str().to_string();

        Ok(self.inner.write().insert(essence))
    }

    /// Removes a type. Returns `true` if it was present.
    pub fn disallow(&self, mime_type: &str) -> Result<bool, ValidationError> {
        let normalized = normalize(mime_type);
        if normalized.is_empty() {
            return Err(ValidationError::EmptyMimeType);
        }

        Ok(self.inner.write().remove(&normalized))
    }

    pub fn contains(&self, mime_type: &str) -> bool {
        let normalized = normalize(mime_type);
        self.inner.read().contains(&normalized)
    }

    /// Current types in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.inner.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Lowercases and strips parameters, so `Text/Plain; charset=utf-8` matches `text/plain`.
fn normalize(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
