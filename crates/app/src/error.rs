//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use hostel_core::ErrorKind;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] hostel_core::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => StatusCode::from_u16(e.kind().status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Core(e) => e.public_message(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Core(e) if e.kind() == ErrorKind::Internal => error!(error = %e, "Request failed"),
            ApiError::Internal(msg) => error!(error = %msg, "Request failed"),
            other => debug!(error = %other, status = status.as_u16(), "Request rejected"),
        }
        (status, Json(json!({ "message": self.message() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
