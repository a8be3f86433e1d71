use crate::auth::{check_credentials, Authenticated};
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::extract::{ValidJson, ValidQuery};
use crate::jwt::{self, SessionClaims};
use crate::media;
use crate::models::{
    AuthUser, ImagePatch, ImageRecord, LoginRequest, LoginResponse, MessageResponse, ResizeQuery,
    UploadResponse,
};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use std::path::Path as FsPath;
use tokio::fs;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

pub async fn login(
    State(state): State<AppState>,
    ValidJson(login_data): ValidJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let username = login_data.username.filter(|s| !s.is_empty());
    let password = login_data.password.filter(|s| !s.is_empty());
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    };

    let user = check_credentials(&state.config.users, &username, &password).ok_or_else(|| {
        tracing::warn!("failed login for {}", username);
        AppError::Auth("Invalid credentials".to_string())
    })?;

    let token = state
        .config
        .jwt
        .as_ref()
        .map(|jwt_config| issue_session_token(user, jwt_config))
        .transpose()?;

    tracing::info!("user {} logged in", user.username);
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        api_key: user.api_key.clone(),
        user: user.clone(),
        token,
    }))
}

fn issue_session_token(user: &AuthUser, jwt_config: &JwtConfig) -> AppResult<String> {
    let now = Utc::now();
    let claims = SessionClaims {
        user_id: user.username.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        fullname: user.fullname.clone(),
        exp: (now + Duration::hours(jwt_config.expiry_hours)).timestamp(),
        iat: now.timestamp(),
    };
    Ok(jwt::sign(&claims, &jwt_config.secret)?)
}

pub async fn list_images(State(state): State<AppState>) -> AppResult<Json<Vec<ImageRecord>>> {
    Ok(Json(state.store.list().await?))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ImageRecord>> {
    Ok(Json(state.store.get(&id).await?))
}

/// Accepts `image` or repeated `images` parts. Parts that are not images are skipped.
pub async fn upload_images(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default();
        if field_name != "image" && field_name != "images" {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let mime = match media::part_mime(field.content_type(), original_name.as_deref()) {
            Some(mime) if media::is_image_mime(&mime) => mime,
            other => {
                tracing::debug!("skipping non-image part {:?} ({:?})", original_name, other);
                continue;
            }
        };

        let data = field.bytes().await?;
        let record = save_image(&state, original_name, mime, &data).await?;
        images.push(record);
    }

    if images.is_empty() {
        return Err(AppError::Validation("No valid image files provided".to_string()));
    }

    tracing::info!("{} uploaded {} image(s)", user.username, images.len());
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: format!("{} image(s) uploaded successfully", images.len()),
            images,
        }),
    ))
}

async fn save_image(
    state: &AppState,
    original_name: Option<String>,
    mime: String,
    data: &[u8],
) -> AppResult<ImageRecord> {
    let id = Uuid::new_v4();
    let ext = media::extension_for(&mime, original_name.as_deref());
    let file_name = format!("{}{}", id, ext);

    let upload_dir = state.store.upload_dir();
    fs::create_dir_all(upload_dir).await?;
    fs::write(upload_dir.join(&file_name), data).await?;

    let dimensions = media::probe_dimensions(data);
    if dimensions.is_none() {
        tracing::warn!("could not read dimensions of {} ({})", file_name, mime);
    }

    let record = ImageRecord {
        id,
        original_name: original_name.unwrap_or_else(|| file_name.clone()),
        path: format!(
            "{}/{}",
            state.config.public_url_prefix.trim_end_matches('/'),
            file_name
        ),
        size: data.len() as u64,
        mime_type: mime,
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
        created_at: Utc::now(),
    };
    state.store.create(record).await
}

pub async fn patch_image(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<ImagePatch>,
) -> AppResult<Json<ImageRecord>> {
    let updated = state.store.patch(&id, patch).await?;
    tracing::info!("{} renamed image {} to {}", user.username, id, updated.original_name);
    Ok(Json(updated))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let removed = state.store.delete(&id).await?;
    tracing::info!("{} deleted image {}", user.username, removed.id);
    Ok(Json(MessageResponse {
        message: "Image deleted successfully".to_string(),
    }))
}

pub async fn resize_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidQuery(query): ValidQuery<ResizeQuery>,
) -> AppResult<Response> {
    let record = state.store.get(&id).await?;
    let path = state.store.file_path(&record);

    // Metadata can outlive its file.
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("image {} has metadata but no file at {}", record.id, path.display());
            return Err(AppError::NotFound("Image file not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let mime = record.mime_type.clone();
    let (width, height) = (query.width, query.height);
    let max_side = state.config.max_resize_dimension;
    let resized = tokio::task::spawn_blocking(move || {
        media::resize(bytes, &mime, width, height, max_side)
    })
    .await??;

    Ok(([(header::CONTENT_TYPE, record.mime_type)], resized).into_response())
}

pub async fn serve_image(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> AppResult<Response> {
    serve_file(state.store.upload_dir(), &file_name).await
}

/// Stream `name` from `dir`. Names that could step outside `dir` are treated as missing.
pub async fn serve_file(dir: &FsPath, name: &str) -> AppResult<Response> {
    let not_found = || AppError::NotFound("File not found".to_string());
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(not_found());
    }

    let path = dir.join(name);
    let file = fs::File::open(&path).await.map_err(|_| not_found())?;
    if !file.metadata().await.map(|m| m.is_file()).unwrap_or(false) {
        return Err(not_found());
    }

    let body = Body::from_stream(ReaderStream::new(file));
    let mime_type = mime_guess::from_path(&path).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, mime_type.to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
        ],
        body,
    )
        .into_response())
}
