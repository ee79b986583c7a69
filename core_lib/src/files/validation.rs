use thiserror::Error;

use super::allow_list::AllowedMimeTypes;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Longest single path component common filesystems accept, in bytes.
pub const MAX_FILENAME_LENGTH: usize = 255;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("Invalid file type: {content_type}")]
    InvalidFileType { content_type: String },

    #[error("Filename too long: {length} bytes (max: {max_length})")]
    FilenameTooLong { length: usize, max_length: usize },

    #[error("Invalid filename: {filename}")]
    InvalidFilename { filename: String },

    #[error("MIME type must not be empty")]
    EmptyMimeType,

    #[error("Invalid MIME type: {mime_type}")]
    InvalidMimeType { mime_type: String },

    #[error("No file was uploaded")]
    MissingFile,
}

/// Upload checks: size limit and MIME allow-list membership.
#[derive(Clone, Debug)]
pub struct FileValidator {
    max_file_size: u64,
    allowed_types: AllowedMimeTypes,
}

impl FileValidator {
    pub fn new(max_file_size: u64, allowed_types: AllowedMimeTypes) -> Self {
        Self {
            max_file_size,
            allowed_types,
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE, AllowedMimeTypes::default())
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn allowed_types(&self) -> &AllowedMimeTypes {
        &self.allowed_types
    }

    pub fn validate_declared_size(&self, size: Option<u64>) -> Result<(), ValidationError> {
        match size {
            Some(size) => self.check_received_size(size),
            None => Ok(()),
        }
    }

    /// Checked against the running byte count while the body streams in.
    pub fn check_received_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max_size: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        if !self.allowed_types.contains(content_type) {
            return Err(ValidationError::InvalidFileType {
                content_type: content_type.to_string(),
            });
        }
        Ok(())
    }
}

/// Reduces a client-supplied name to its final path component.
///
/// Both `/` and `\` count as separators regardless of platform, so
/// `..\..\boot.ini` and `../../etc/passwd` both collapse to a bare name.
pub fn sanitize_file_name(name: &str) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidFilename {
        filename: name.to_string(),
    };

    if name.contains('\0') {
        return Err(invalid());
    }

    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(invalid());
    }

    if base.len() > MAX_FILENAME_LENGTH {
        return Err(ValidationError::FilenameTooLong {
            length: base.len(),
            max_length: MAX_FILENAME_LENGTH,
        });
    }

    Ok(base.to_string())
}
