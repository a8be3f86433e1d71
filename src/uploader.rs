//! Standalone upload service: raw files in, raw files out, and a spreadsheet listing.

use crate::config::UploaderConfig;
use crate::error::{AppError, AppResult};
use crate::handlers::serve_file;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

#[derive(Clone)]
pub struct UploaderState {
    pub upload_dir: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct StoredFile {
    pub message: String,
    pub filename: String,
}

pub fn build_uploader_router(config: &UploaderConfig) -> Router {
    let state = UploaderState {
        upload_dir: Arc::new(config.upload_dir.clone()),
    };
    Router::new()
        .route("/upload", post(upload_file))
        .route("/uploads/:name", get(serve_upload))
        .route("/exportToExcel", get(export_to_excel))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state)
}

/// Keep only what follows the last space of a client filename, reduced to its final component.
pub fn stored_name(client_name: &str) -> Option<String> {
    let tail = client_name.rsplit(' ').next().unwrap_or(client_name);
    let tail = tail.rsplit(['/', '\\']).next().unwrap_or(tail);
    if tail.is_empty() || tail == "." || tail == ".." {
        return None;
    }
    Some(tail.to_string())
}

pub async fn upload_file(
    State(state): State<UploaderState>,
    mut multipart: Multipart,
) -> AppResult<Json<StoredFile>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .and_then(stored_name)
            .ok_or_else(|| AppError::Validation("Uploaded file has no usable name".to_string()))?;
        let data = field.bytes().await?;

        fs::create_dir_all(state.upload_dir.as_path()).await?;
        fs::write(state.upload_dir.join(&filename), &data).await?;
        tracing::info!("stored upload {} ({} bytes)", filename, data.len());

        return Ok(Json(StoredFile {
            message: "File uploaded successfully".to_string(),
            filename,
        }));
    }

    Err(AppError::Validation("No file uploaded".to_string()))
}

pub async fn serve_upload(
    State(state): State<UploaderState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    serve_file(&state.upload_dir, &name).await
}

pub async fn export_to_excel(State(state): State<UploaderState>) -> AppResult<Response> {
    let names = list_uploads(&state.upload_dir).await?;
    let bytes = tokio::task::spawn_blocking(move || build_workbook(&names)).await??;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"uploads.xlsx\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Sorted names of the regular files in `dir`. A missing directory has none.
pub async fn list_uploads(dir: &std::path::Path) -> AppResult<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn build_workbook(names: &[String]) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    worksheet.write_with_format(0, 0, "File Name", &bold)?;
    for (row, name) in names.iter().enumerate() {
        worksheet.write(row as u32 + 1, 0, name.as_str())?;
    }
    worksheet.set_column_width(0, 40)?;

    Ok(workbook.save_to_buffer()?)
}
