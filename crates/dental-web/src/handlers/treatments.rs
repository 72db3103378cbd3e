//! 治疗接口

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use dental_core::{
    CreateTreatmentRequest, Page, Treatment, TreatmentFilter, UpdateTreatmentRequest,
};
use dental_workflow::TreatmentEvent;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::server::AppState;

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TreatmentFilter>,
) -> ApiResult<Json<Page<Treatment>>> {
    Ok(Json(state.engine.treatments().list(&filter).await?))
}

pub async fn list_for_patient(
    State(state): State<AppState>,
    ApiPath(patient_id): ApiPath<Uuid>,
    ApiQuery(filter): ApiQuery<TreatmentFilter>,
) -> ApiResult<Json<Page<Treatment>>> {
    Ok(Json(
        state
            .engine
            .treatments()
            .list_for_patient(patient_id, filter)
            .await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    ApiPath(patient_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CreateTreatmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let treatment = state.engine.treatments().create(patient_id, request).await?;
    Ok((StatusCode::CREATED, Json(treatment)))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Treatment>> {
    Ok(Json(state.engine.treatments().get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateTreatmentRequest>,
) -> ApiResult<Json<Treatment>> {
    Ok(Json(state.engine.treatments().update(id, request).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_delete()?;
    state.engine.treatments().delete(id).await?;
    info!(treatment_id = %id, by = %user.username, "Treatment deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

async fn apply(state: AppState, id: Uuid, event: TreatmentEvent) -> ApiResult<Json<Treatment>> {
    let treatment = state.engine.treatments().apply_event(id, event).await?;
    state
        .metrics
        .record_domain_event("treatment", &format!("{:?}", event));
    Ok(Json(treatment))
}

pub async fn start(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Treatment>> {
    apply(state, id, TreatmentEvent::Start).await
}

pub async fn complete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Treatment>> {
    apply(state, id, TreatmentEvent::Complete).await
}

pub async fn hold(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Treatment>> {
    apply(state, id, TreatmentEvent::Hold).await
}

pub async fn resume(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Treatment>> {
    apply(state, id, TreatmentEvent::Resume).await
}

pub async fn cancel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Treatment>> {
    apply(state, id, TreatmentEvent::Cancel).await
}
