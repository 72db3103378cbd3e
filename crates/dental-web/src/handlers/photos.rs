//! 照片接口

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use dental_core::{CreatePhotoRequest, Photo};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::server::AppState;

pub async fn list_for_treatment(
    State(state): State<AppState>,
    ApiPath(treatment_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Photo>>> {
    Ok(Json(
        state.engine.photos().list_for_treatment(treatment_id).await?,
    ))
}

/// 登记照片元数据，内容通过 `PUT /photos/:id/content` 上传
pub async fn register(
    State(state): State<AppState>,
    ApiPath(treatment_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CreatePhotoRequest>,
) -> ApiResult<impl IntoResponse> {
    let photo = state.engine.photos().register(treatment_id, request).await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Photo>> {
    Ok(Json(state.engine.photos().get(id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_delete()?;
    state.engine.photos().delete(id).await?;
    info!(photo_id = %id, by = %user.username, "Photo deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

/// 上传原始字节
pub async fn upload_content(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Photo>> {
    Ok(Json(state.engine.photos().upload_content(id, &body).await?))
}

pub async fn download_content(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let content = state.engine.photos().download_content(id).await?;

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&content.photo.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(checksum) = &content.photo.checksum {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", checksum)) {
            headers.insert(header::ETAG, value);
        }
    }
    let file_name = content.photo.file_name.replace('"', "");
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((headers, content.data))
}

pub async fn archive(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Photo>> {
    let photo = state.engine.photos().archive(id).await?;
    state.metrics.record_domain_event("photo", "Archive");
    Ok(Json(photo))
}
