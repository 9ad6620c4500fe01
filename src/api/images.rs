// Image object handlers
use actix_multipart::{Field, Multipart};
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::io::{self, Read};

use crate::app_state::AppState;
use crate::auth::SignedRequest;
use crate::error::ApiError;
use crate::service::{StorageService, Upload};

/// Multipart field carrying the uploaded file
pub const FILE_FIELD: &str = "file";

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub filename: String,
    pub original_filename: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: &'static str,
    pub size: u64,
}

/// POST /images
pub async fn upload_image(
    _signed: SignedRequest,
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (original_filename, mut field) = next_file_field(&mut payload)
        .await?
        .ok_or(ApiError::BadRequest("File not found in the request"))?;

    let filename = StorageService::generate_name(&original_filename);
    debug!("Uploading {:?} as {}", original_filename, filename);

    let mut upload = state.storage_service.begin_write(&filename)?;
    copy_field(&mut field, &mut upload).await?;
    let size = upload.finish()?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        message: "File uploaded",
        filename,
        original_filename,
        size,
    }))
}

/// GET /images/{filename}
pub async fn get_image(
    signed: SignedRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let filename = signed.filename;
    let object = state.storage_service.open(&filename)?;
    info!("Serving {} ({} bytes)", filename, object.size);

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_DISPOSITION, format!("inline; filename={}", filename)))
        .insert_header((header::CONTENT_TYPE, content_type_for(&filename)))
        .no_chunking(object.size)
        .streaming(read_stream(object.reader)))
}

/// PUT /images/{filename}
pub async fn update_image(
    signed: SignedRequest,
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let filename = signed.filename;
    let service = &state.storage_service;

    // Not an upsert: the object must exist before the body is read.
    service.ensure_exists(&filename)?;

    let (_, mut field) = next_file_field(&mut payload)
        .await?
        .ok_or(ApiError::BadRequest("File not found in the request"))?;

    let mut upload = service.begin_write(&filename)?;
    copy_field(&mut field, &mut upload).await?;
    let size = upload.finish()?;

    Ok(HttpResponse::Ok().json(UpdateResponse {
        message: "File updated",
        size,
    }))
}

/// DELETE /images/{filename}
pub async fn delete_image(
    signed: SignedRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    state.storage_service.remove(&signed.filename)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "File removed" })))
}

/// Content type by extension. Unknown or missing extensions are served as
/// `application/octet-stream`.
pub fn content_type_for(filename: &str) -> &'static str {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or("application/octet-stream")
}

/// Skip ahead to the `file` part that carries a non-empty filename. Returns
/// the client's filename and the field positioned at its first byte. A form
/// submitted with no file chosen sends `filename=""`, which is not an upload.
async fn next_file_field(payload: &mut Multipart) -> Result<Option<(String, Field)>, ApiError> {
    while let Some(item) = payload.next().await {
        let field = item.map_err(|e| {
            warn!("Malformed multipart body: {}", e);
            ApiError::BadRequest("File not found in the request")
        })?;

        let original = field
            .content_disposition()
            .filter(|cd| cd.get_name() == Some(FILE_FIELD))
            .and_then(|cd| cd.get_filename())
            .filter(|name| !name.is_empty())
            .map(str::to_owned);
        if let Some(original) = original {
            return Ok(Some((original, field)));
        }
    }
    Ok(None)
}

async fn copy_field(field: &mut Field, upload: &mut Upload) -> Result<(), ApiError> {
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            error!("Failed to read upload for {}: {}", upload.name(), e);
            ApiError::Internal("Failed to save file.")
        })?;
        upload.write_chunk(&chunk)?;
    }
    Ok(())
}

fn read_stream(reader: Box<dyn Read + Send>) -> impl Stream<Item = Result<Bytes, io::Error>> {
    futures::stream::unfold(Some(reader), |state| async move {
        let mut reader = match state {
            Some(reader) => reader,
            None => return None,
        };
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        match reader.read(&mut buf) {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(e) => {
                error!("Failed while streaming file: {}", e);
                Some((Err(e), None))
            }
        }
    })
}
