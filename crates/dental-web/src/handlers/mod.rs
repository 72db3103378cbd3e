//! HTTP处理器

pub mod analyses;
pub mod patients;
pub mod photos;
pub mod treatments;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use dental_core::DentalError;
use dental_workflow::PracticeOverview;
use serde_json::json;
use tracing::warn;

use crate::error::ApiResult;
use crate::server::AppState;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Dental Practice API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器，数据库不可用时返回 503
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.uptime().as_secs();
    match state.engine.health_check().await {
        Ok(backend) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": backend,
                "uptime_seconds": uptime,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "uptime_seconds": uptime,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
    }
}

/// Prometheus 指标
pub async fn metrics_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| DentalError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// 诊所统计
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<PracticeOverview>> {
    Ok(Json(state.engine.stats().overview().await?))
}
