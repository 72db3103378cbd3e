//! 错误到 HTTP 响应的映射

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dental_core::DentalError;
use serde_json::json;
use tracing::error;

/// HTTP 层错误包装
#[derive(Debug)]
pub struct ApiError(pub DentalError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DentalError::Validation(_) => StatusCode::BAD_REQUEST,
            DentalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DentalError::Permission(_) => StatusCode::FORBIDDEN,
            DentalError::NotFound(_) => StatusCode::NOT_FOUND,
            DentalError::Conflict(_) | DentalError::InvalidStateTransition { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 机器可读的错误码
    pub fn code(&self) -> &'static str {
        match &self.0 {
            DentalError::Validation(_) => "VALIDATION_ERROR",
            DentalError::Unauthorized(_) => "UNAUTHORIZED",
            DentalError::Permission(_) => "FORBIDDEN",
            DentalError::NotFound(_) => "NOT_FOUND",
            DentalError::Conflict(_) => "CONFLICT",
            DentalError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<DentalError> for ApiError {
    fn from(err: DentalError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(DentalError::Validation(format!(
            "invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(DentalError::Validation(format!(
            "invalid path parameter: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(DentalError::Validation(format!(
            "invalid query string: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "Request failed with internal error");
            "internal server error".to_string()
        } else {
            match &self.0 {
                DentalError::Validation(msg)
                | DentalError::Unauthorized(msg)
                | DentalError::Permission(msg)
                | DentalError::NotFound(msg)
                | DentalError::Conflict(msg) => msg.clone(),
                other => other.to_string(),
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            },
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DentalError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DentalError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (DentalError::Permission("x".into()), StatusCode::FORBIDDEN),
            (DentalError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (DentalError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                DentalError::InvalidStateTransition {
                    entity: "treatment",
                    from: "Completed".into(),
                    event: "Start".into(),
                },
                StatusCode::CONFLICT,
            ),
            (DentalError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DentalError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_message_is_hidden() {
        use http_body_util::BodyExt;

        let response = ApiError(DentalError::Database("password=secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "internal server error");
        assert_eq!(body["status"], 500);
    }
}
