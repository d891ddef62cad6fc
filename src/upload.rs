use std::path::{Path, PathBuf};

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, State,
    },
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadReply {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Base64Upload {
    pub filename: String,
    pub base64: String,
}

/// `<uuid>.<ext>`, keeping the original extension when it is plain alphanumeric.
pub fn stored_file_name(original: &str) -> String {
    let id = Uuid::new_v4();
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

async fn store_file(dir: &Path, url_prefix: &str, original: &str, data: &[u8]) -> AppResult<UploadReply> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        tracing::error!("failed to create upload directory {:?}: {:?}", dir, e);
        AppError::from(e)
    })?;

    let file_name = stored_file_name(original);
    let path: PathBuf = dir.join(&file_name);
    tokio::fs::write(&path, data).await.map_err(|e| {
        tracing::error!("failed to write upload {:?}: {:?}", path, e);
        AppError::from(e)
    })?;

    let url = format!("{}/{}", url_prefix, file_name);
    tracing::info!(bytes = data.len(), %url, "file uploaded");
    Ok(UploadReply { url })
}

/// `POST /api/upload`, multipart with a `file` field.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadReply>> {
    tracing::info!("upload started");
    let mut multipart = multipart?;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let original = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            file = Some((original, data.to_vec()));
            break;
        }
    }

    let (original, data) = file.ok_or_else(|| AppError::validation("No file uploaded"))?;
    let reply = store_file(
        &state.config.upload_dir,
        &state.config.upload_url_prefix,
        &original,
        &data,
    )
    .await?;
    Ok(Json(reply))
}

/// `POST /api/upload/base64`, for clients that cannot send multipart.
pub async fn upload_base64(
    State(state): State<AppState>,
    payload: Result<Json<Base64Upload>, JsonRejection>,
) -> AppResult<Json<UploadReply>> {
    tracing::info!("upload_base64 started");
    let Json(upload) = payload?;

    // data URLs carry a `data:image/png;base64,` prefix
    let encoded = match upload.base64.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => upload.base64.as_str(),
    };
    let data = STANDARD.decode(encoded.trim()).map_err(|e| {
        tracing::error!("invalid base64 upload: {:?}", e);
        AppError::validation("Invalid base64 data")
    })?;
    if data.is_empty() {
        return Err(AppError::validation("No file uploaded"));
    }

    let reply = store_file(
        &state.config.upload_dir,
        &state.config.upload_url_prefix,
        &upload.filename,
        &data,
    )
    .await?;
    Ok(Json(reply))
}
