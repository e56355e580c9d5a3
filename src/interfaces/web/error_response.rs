use crate::domain::painting::errors::ServiceError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// HTTP API のエラー応答
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl ErrorResponse {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: status_code
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: message.into(),
            status_code: status_code.as_u16(),
        }
    }
}

impl From<ServiceError> for ErrorResponse {
    fn from(error: ServiceError) -> Self {
        let status = match &error {
            ServiceError::NotFound { .. } | ServiceError::PictureNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::ConcurrentModification { .. } => StatusCode::CONFLICT,
            ServiceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Storage { .. } | ServiceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status_code, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_status() {
        let unavailable = ErrorResponse::from(ServiceError::Connection {
            message: "offline".to_string(),
        });
        assert_eq!(unavailable.status_code, 503);
        assert_eq!(unavailable.error, "Service Unavailable");
        assert!(unavailable.message.contains("offline"));

        let invalid = ErrorResponse::from(ServiceError::InvalidInput {
            message: "blank title".to_string(),
        });
        assert_eq!(invalid.status_code, 400);
    }
}
