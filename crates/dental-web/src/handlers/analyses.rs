//! AI分析接口

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use dental_core::{Analysis, CompleteAnalysisRequest, CreateAnalysisRequest, FailAnalysisRequest};
use dental_workflow::AnalysisEvent;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::server::AppState;

pub async fn list_for_photo(
    State(state): State<AppState>,
    ApiPath(photo_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Analysis>>> {
    Ok(Json(state.engine.analyses().list_for_photo(photo_id).await?))
}

pub async fn request(
    State(state): State<AppState>,
    ApiPath(photo_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CreateAnalysisRequest>,
) -> ApiResult<impl IntoResponse> {
    let analysis = state.engine.analyses().request(photo_id, request).await?;
    Ok((StatusCode::CREATED, Json(analysis)))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Analysis>> {
    Ok(Json(state.engine.analyses().get(id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_delete()?;
    state.engine.analyses().delete(id).await?;
    info!(analysis_id = %id, by = %user.username, "Analysis deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CompleteAnalysisRequest>,
) -> ApiResult<Json<Analysis>> {
    let analysis = state.engine.analyses().complete(id, request).await?;
    state.metrics.record_domain_event("analysis", "Complete");
    Ok(Json(analysis))
}

pub async fn fail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<FailAnalysisRequest>,
) -> ApiResult<Json<Analysis>> {
    let analysis = state.engine.analyses().fail(id, request).await?;
    state.metrics.record_domain_event("analysis", "Fail");
    Ok(Json(analysis))
}

async fn apply(state: AppState, id: Uuid, event: AnalysisEvent) -> ApiResult<Json<Analysis>> {
    let analysis = state.engine.analyses().apply_event(id, event).await?;
    state
        .metrics
        .record_domain_event("analysis", &format!("{:?}", event));
    Ok(Json(analysis))
}

pub async fn start(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Analysis>> {
    apply(state, id, AnalysisEvent::Start).await
}

pub async fn cancel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Analysis>> {
    apply(state, id, AnalysisEvent::Cancel).await
}

pub async fn retry(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Analysis>> {
    apply(state, id, AnalysisEvent::Retry).await
}
