use std::io;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use super::allow_list::AllowedMimeTypes;
use super::models::{FileUpload, StorageStats, StoredFile};
use super::validation::{sanitize_file_name, FileValidator, ValidationError, DEFAULT_MAX_FILE_SIZE};

#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    pub storage_path: PathBuf,
    pub staging_path: PathBuf,
    pub max_file_size: u64,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./SharedStorage"),
            staging_path: PathBuf::from("./SharedStorage.staging"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl From<&StorageConfig> for FileStoreConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            storage_path: config.storage_dir.clone(),
            staging_path: config.staging_dir.clone(),
            max_file_size: config.max_file_size_bytes,
        }
    }
}

/// Flat directory of uploaded files. The directory listing is the only record
/// of what is stored.
#[derive(Clone, Debug)]
pub struct FileStore {
    config: FileStoreConfig,
    validator: FileValidator,
}

impl FileStore {
    pub fn new(config: FileStoreConfig, allowed_types: AllowedMimeTypes) -> Self {
        let validator = FileValidator::new(config.max_file_size, allowed_types);

        Self { config, validator }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            FileStoreConfig::from(config),
            AllowedMimeTypes::new(&config.allowed_mime_types),
        )
    }

    pub fn with_default_config() -> Self {
        Self::new(FileStoreConfig::default(), AllowedMimeTypes::default())
    }

    pub fn allowed_mime_types(&self) -> &AllowedMimeTypes {
        self.validator.allowed_types()
    }

    pub fn max_file_size(&self) -> u64 {
        self.validator.max_file_size()
    }

    pub fn storage_path(&self) -> &Path {
        &self.config.storage_path
    }

    pub async fn initialize(&self) -> Result<()> {
        async_fs::create_dir_all(&self.config.storage_path).await?;
        async_fs::create_dir_all(&self.config.staging_path).await?;

        Ok(())
    }

    /// Streams `body` into the store under the sanitized upload name.
    ///
    /// The bytes land in a staging file first and are renamed into place only
    /// after the whole body was received within the size limit.
    pub async fn upload<S, E>(&self, upload: FileUpload, body: S) -> Result<StoredFile>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<AppError>,
    {
        let mut body = std::pin::pin!(body);

        let file_name = sanitize_file_name(&upload.file_name)?;
        self.validator.validate_declared_size(upload.declared_size)?;
        self.validator.validate_content_type(&upload.content_type)?;

        let target = self.config.storage_path.join(&file_name);
        if !upload.overwrite {
            self.ensure_absent(&file_name, &target).await?;
        }

        let mut staging = StagingFile::new(
            self.config
                .staging_path
                .join(format!("{}.part", Uuid::new_v4())),
        );
        let mut file = async_fs::File::create(staging.path()).await?;

        let mut received: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<AppError>::into)?;
            received += chunk.len() as u64;
            self.validator.check_received_size(received)?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if !upload.overwrite {
            self.ensure_absent(&file_name, &target).await?;
        }

        staging.commit(&target).await?;

        let metadata = async_fs::metadata(&target).await?;
        let path = self.absolute_storage_path().await.join(&file_name);

        tracing::info!(
            file = %file_name,
            size = received,
            overwrite = upload.overwrite,
            "stored file"
        );

        Ok(StoredFile::from_metadata(file_name, path, &metadata))
    }

    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        let base = self.absolute_storage_path().await;
        let mut entries = async_fs::read_dir(&self.config.storage_path).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            // entries removed by a concurrent delete are simply not listed
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let path = base.join(&name);
            files.push(StoredFile::from_metadata(name, path, &metadata));
        }

        Ok(files)
    }

    /// Opens a stored file for reading.
    pub async fn download(&self, file_name: &str) -> Result<(StoredFile, async_fs::File)> {
        let (name, target) = self.resolve(file_name)?;

        let file = async_fs::File::open(&target)
            .await
            .map_err(|e| not_found_or_io(e, &name))?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(no_such_file(&name));
        }

        let path = self.absolute_storage_path().await.join(&name);
        Ok((StoredFile::from_metadata(name, path, &metadata), file))
    }

    pub async fn delete(&self, file_name: &str) -> Result<()> {
        let (name, target) = self.resolve(file_name)?;

        let metadata = async_fs::metadata(&target)
            .await
            .map_err(|e| not_found_or_io(e, &name))?;
        if !metadata.is_file() {
            return Err(no_such_file(&name));
        }

        async_fs::remove_file(&target).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                no_such_file(&name)
            } else if is_in_use(&e) {
                AppError::FileInUse(format!("{}: {}", target.display(), e))
            } else {
                AppError::IoError(e)
            }
        })?;

        tracing::info!(file = %name, "deleted file");
        Ok(())
    }

    pub async fn stats(&self) -> Result<StorageStats> {
        let files = self.list().await?;

        Ok(StorageStats {
            file_count: files.len() as u64,
            total_bytes: files.iter().map(|f| f.size_bytes).sum(),
            storage_path: self.absolute_storage_path().await,
        })
    }

    /// Sanitizes a lookup name. A name too long to ever have been stored
    /// cannot exist, so it is reported as not found.
    fn resolve(&self, file_name: &str) -> Result<(String, PathBuf)> {
        let name = sanitize_file_name(file_name).map_err(|e| match e {
            ValidationError::FilenameTooLong { .. } => no_such_file(file_name),
            other => other.into(),
        })?;
        let target = self.config.storage_path.join(&name);
        Ok((name, target))
    }

    async fn ensure_absent(&self, file_name: &str, target: &Path) -> Result<()> {
        if async_fs::try_exists(target).await? {
            return Err(AppError::Conflict(format!(
                "File '{}' already exists",
                file_name
            )));
        }
        Ok(())
    }

    async fn absolute_storage_path(&self) -> PathBuf {
        async_fs::canonicalize(&self.config.storage_path)
            .await
            .unwrap_or_else(|_| self.config.storage_path.clone())
    }
}

/// Staged upload that is removed on drop unless committed.
struct StagingFile {
    path: PathBuf,
    committed: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn commit(&mut self, target: &Path) -> Result<()> {
        match async_fs::rename(&self.path, target).await {
            Ok(()) => {
                self.committed = true;
                Ok(())
            }
            Err(e) if is_cross_device(&e) => {
                async_fs::copy(&self.path, target).await?;
                self.committed = true;

                if let Err(e) = async_fs::remove_file(&self.path).await {
                    tracing::warn!("Failed to remove staging file {}: {}", self.path.display(), e);
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove staging file {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

fn no_such_file(name: &str) -> AppError {
    AppError::NotFound(format!("No such file: {}", name))
}

fn not_found_or_io(err: io::Error, name: &str) -> AppError {
    if err.kind() == io::ErrorKind::NotFound {
        no_such_file(name)
    } else {
        AppError::IoError(err)
    }
}

fn is_in_use(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied || is_sharing_violation(err)
}

// EXDEV
#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(18)
}

// ERROR_NOT_SAME_DEVICE
#[cfg(windows)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}

// ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
#[cfg(windows)]
fn is_sharing_violation(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_sharing_violation(_err: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();

        let config = FileStoreConfig {
            storage_path: temp_dir.path().join("storage"),
            staging_path: temp_dir.path().join("staging"),
            max_file_size: 64,
        };

        (FileStore::new(config, AllowedMimeTypes::default()), temp_dir)
    }

    fn body(chunks: &[&'static [u8]]) -> impl Stream<Item = io::Result<Bytes>> {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok::<_, io::Error>(Bytes::from_static(*c)))
                .collect::<Vec<_>>(),
        )
    }

    async fn read_all(store: &FileStore, name: &str) -> Vec<u8> {
        let (stored, _file) = store.download(name).await.unwrap();
        async_fs::read(&stored.path).await.unwrap()
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (store, temp_dir) = create_test_store();
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
        assert!(temp_dir.path().join("storage").is_dir());
        assert!(temp_dir.path().join("staging").is_dir());
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let (store, _temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        let stored = store
            .upload(FileUpload::new("hello.txt", "text/plain"), body(&[b"Hello, ", b"World!"]))
            .await
            .unwrap();

        assert_eq!(stored.name, "hello.txt");
        assert_eq!(stored.size_bytes, 13);
        assert!(stored.path.is_absolute());
        assert_eq!(read_all(&store, "hello.txt").await, b"Hello, World!");
    }

    #[tokio::test]
    async fn test_conflict_keeps_original() {
        let (store, _temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        store
            .upload(FileUpload::new("a.txt", "text/plain"), body(&[b"first"]))
            .await
            .unwrap();

        let result = store
            .upload(FileUpload::new("a.txt", "text/plain"), body(&[b"second"]))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(read_all(&store, "a.txt").await, b"first");

        store
            .upload(
                FileUpload::new("a.txt", "text/plain").with_overwrite(true),
                body(&[b"second"]),
            )
            .await
            .unwrap();
        assert_eq!(read_all(&store, "a.txt").await, b"second");
    }

    #[tokio::test]
    async fn test_oversized_stream_leaves_nothing_behind() {
        let (store, temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        let chunk: &'static [u8] = &[7u8; 40];
        let result = store
            .upload(FileUpload::new("big.txt", "text/plain"), body(&[chunk, chunk]))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert!(store.list().await.unwrap().is_empty());
        let staged = std::fs::read_dir(temp_dir.path().join("staging")).unwrap().count();
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn test_declared_size_checked_before_reading() {
        let (store, _temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        let result = store
            .upload(
                FileUpload::new("big.txt", "image/png").with_declared_size(65),
                body(&[b"x"]),
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_disallowed_type_rejected() {
        let (store, _temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        let result = store
            .upload(FileUpload::new("a.pdf", "application/pdf"), body(&[b"%PDF"]))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        store.allowed_mime_types().allow("application/pdf").unwrap();
        let stored = store
            .upload(FileUpload::new("a.pdf", "application/pdf"), body(&[b"%PDF"]))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 4);
    }

    #[tokio::test]
    async fn test_traversal_name_stays_inside_store() {
        let (store, temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        let stored = store
            .upload(FileUpload::new("../../etc/passwd", "text/plain"), body(&[b"root"]))
            .await
            .unwrap();

        assert_eq!(stored.name, "passwd");
        assert!(temp_dir.path().join("storage").join("passwd").is_file());
        assert!(!temp_dir.path().join("etc").exists());
    }

    #[tokio::test]
    async fn test_list_skips_directories() {
        let (store, temp_dir) = create_test_store();
        store.initialize().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());

        std::fs::create_dir(temp_dir.path().join("storage").join("nested")).unwrap();
        store
            .upload(FileUpload::new("one.txt", "text/plain"), body(&[b"1"]))
            .await
            .unwrap();
        store
            .upload(FileUpload::new("two.txt", "text/plain"), body(&[b"22"]))
            .await
            .unwrap();

        let mut names: Vec<String> = store.list().await.unwrap().into_iter().map(|f| f.name).collect();
        names.sort();
        assert_eq!(names, vec!["one.txt", "two.txt"]);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_bytes, 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        store
            .upload(FileUpload::new("gone.txt", "text/plain"), body(&[b"bye"]))
            .await
            .unwrap();
        store.delete("gone.txt").await.unwrap();

        assert!(matches!(store.download("gone.txt").await, Err(AppError::NotFound(_))));
        assert!(matches!(store.delete("gone.txt").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_list_during_concurrent_deletes() {
        let (store, temp_dir) = create_test_store();
        store.initialize().await.unwrap();
        let storage = temp_dir.path().join("storage");

        for round in 0..10 {
            let names: Vec<String> = (0..200).map(|i| format!("r{}-{}.txt", round, i)).collect();
            for name in &names {
                std::fs::write(storage.join(name), b"x").unwrap();
            }

            let dir = storage.clone();
            let deleter = tokio::spawn(async move {
                for name in names {
                    async_fs::remove_file(dir.join(name)).await.unwrap();
                }
            });

            while !deleter.is_finished() {
                let listed = store.list().await.unwrap();
                assert!(listed.len() <= 200);
                store.stats().await.unwrap();
            }
            deleter.await.unwrap();
        }

        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlong_names() {
        let (store, _temp_dir) = create_test_store();
        store.initialize().await.unwrap();
        let long_name = format!("{}.txt", "n".repeat(300));

        let result = store
            .upload(FileUpload::new(long_name.clone(), "text/plain"), body(&[b"x"]))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert!(matches!(store.download(&long_name).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.delete(&long_name).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_commit_is_reported_and_cleaned_up() {
        let (store, temp_dir) = create_test_store();
        store.initialize().await.unwrap();

        let blocker = temp_dir.path().join("storage").join("taken");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("inner.txt"), b"keep").unwrap();

        let result = store
            .upload(
                FileUpload::new("taken", "text/plain").with_overwrite(true),
                body(&[b"data"]),
            )
            .await;
        assert!(matches!(result, Err(AppError::IoError(_))));

        assert!(blocker.join("inner.txt").is_file());
        let staged = std::fs::read_dir(temp_dir.path().join("staging")).unwrap().count();
        assert_eq!(staged, 0);
    }

    #[test]
    fn test_cross_device_detection() {
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::NotFound)));

        #[cfg(unix)]
        assert!(is_cross_device(&io::Error::from_raw_os_error(18)));
        #[cfg(windows)]
        assert!(is_cross_device(&io::Error::from_raw_os_error(17)));
    }

    #[test]
    fn test_in_use_detection() {
        assert!(is_in_use(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_in_use(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(!is_in_use(&io::Error::from(io::ErrorKind::Other)));
    }
}
