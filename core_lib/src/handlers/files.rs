use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::{
    error::{AppError, Result},
    files::{FileUpload, StorageStats, StoredFile, ValidationError},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct MimeTypeQuery {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub path: String,
    pub file_name: String,
    pub size: u64,
    pub upload_date: String,
}

impl From<StoredFile> for UploadResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            path: file.path.to_string_lossy().into_owned(),
            file_name: file.name,
            size: file.size_bytes,
            upload_date: file.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub created_date: String,
    pub file_path: String,
}

impl From<StoredFile> for FileEntry {
    fn from(file: StoredFile) -> Self {
        Self {
            name: file.name,
            size: file.size_bytes,
            created_date: file.created_at.to_rfc3339(),
            file_path: file.path.to_string_lossy().into_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let result = receive_upload(&state, query.overwrite, &mut multipart).await;

    match result {
        Ok(stored) => {
            state.metrics.record_upload(stored.size_bytes);
            Ok(Json(stored.into()))
        }
        Err(err) => {
            if matches!(err, AppError::Validation(_) | AppError::Conflict(_)) {
                warn!("Upload rejected: {}", err);
                state.metrics.record_rejected_upload();
            }
            Err(err)
        }
    }
}

/// Stores the first multipart part that carries a filename.
async fn receive_upload(
    state: &AppState,
    overwrite: bool,
    multipart: &mut Multipart,
) -> Result<StoredFile> {
    while let Some(field) = multipart.next_field().await? {
        let file_name = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        let content_type = match field.content_type() {
            Some(content_type) => content_type.to_string(),
            None => mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        let mut upload = FileUpload::new(file_name, content_type).with_overwrite(overwrite);
        if let Some(size) = field
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            upload = upload.with_declared_size(size);
        }

        return state.file_store.upload(upload, field).await;
    }

    Err(ValidationError::MissingFile.into())
}

pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>> {
    let files = state.file_store.list().await?;
    Ok(Json(files.into_iter().map(FileEntry::from).collect()))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response> {
    let (stored, file) = state.file_store.download(&file_name).await?;
    state.metrics.record_download();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stored.size_bytes));

    let disposition = format!(
        "attachment; filename=\"{}\"",
        stored.name.replace('\\', "\\\\").replace('"', "\\\"")
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.file_store.delete(&file_name).await?;
    state.metrics.record_delete();

    Ok(MessageResponse::new("File deleted successfully"))
}

pub async fn allow_mime_type(
    State(state): State<AppState>,
    Query(query): Query<MimeTypeQuery>,
) -> Result<Json<MessageResponse>> {
    let added = state.file_store.allowed_mime_types().allow(&query.mime_type)?;
    let mime_type = query.mime_type.trim();

    let message = if added {
        info!("MIME type allowed: {}", mime_type);
        format!("MIME type '{}' added to the allow-list", mime_type)
    } else {
        format!("MIME type '{}' is already allowed", mime_type)
    };

    Ok(MessageResponse::new(message))
}

pub async fn remove_mime_type(
    State(state): State<AppState>,
    Query(query): Query<MimeTypeQuery>,
) -> Result<Json<MessageResponse>> {
    let removed = state.file_store.allowed_mime_types().disallow(&query.mime_type)?;
    let mime_type = query.mime_type.trim();

    let message = if removed {
        info!("MIME type removed: {}", mime_type);
        format!("MIME type '{}' removed from the allow-list", mime_type)
    } else {
        format!("MIME type '{}' was not allowed", mime_type)
    };

    Ok(MessageResponse::new(message))
}

pub async fn list_mime_types(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.file_store.allowed_mime_types().list())
}

pub async fn storage_stats(State(state): State<AppState>) -> Result<Json<StorageStats>> {
    Ok(Json(state.file_store.stats().await?))
}
