//! 患者接口

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use dental_core::{CreatePatientRequest, Page, Patient, PatientFilter, UpdatePatientRequest};
use dental_workflow::{PatientEvent, PatientSummary};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::server::AppState;

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PatientFilter>,
) -> ApiResult<Json<Page<Patient>>> {
    Ok(Json(state.engine.patients().list(&filter).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreatePatientRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.engine.patients().create(request).await?;
    info!(patient_id = %patient.id, by = %user.username, "Patient created via API");
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.engine.patients().get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdatePatientRequest>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.engine.patients().update(id, request).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_delete()?;
    state.engine.patients().delete(id).await?;
    info!(patient_id = %id, by = %user.username, "Patient deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn summary(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PatientSummary>> {
    Ok(Json(state.engine.patients().summary(id).await?))
}

async fn change_status(state: AppState, id: Uuid, event: PatientEvent) -> ApiResult<Json<Patient>> {
    let patient = state.engine.patients().change_status(id, event).await?;
    state
        .metrics
        .record_domain_event("patient", &format!("{:?}", event));
    Ok(Json(patient))
}

pub async fn activate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Patient>> {
    change_status(state, id, PatientEvent::Activate).await
}

pub async fn deactivate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Patient>> {
    change_status(state, id, PatientEvent::Deactivate).await
}

pub async fn archive(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Patient>> {
    change_status(state, id, PatientEvent::Archive).await
}
