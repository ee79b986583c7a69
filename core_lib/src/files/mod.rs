pub mod allow_list;
pub mod models;
pub mod store;
pub mod validation;

pub use allow_list::{AllowedMimeTypes, DEFAULT_ALLOWED_MIME_TYPES};
pub use models::{FileUpload, StorageStats, StoredFile};
pub use store::{FileStore, FileStoreConfig};
pub use validation::{
    sanitize_file_name, FileValidator, ValidationError, DEFAULT_MAX_FILE_SIZE, MAX_FILENAME_LENGTH,
};
