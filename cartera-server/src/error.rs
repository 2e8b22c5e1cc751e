//! Mapping of service errors onto HTTP responses.

use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cartera_rag::{ErrorKind, RagError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Error returned by every handler; renders as `{"detail": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rag(#[from] RagError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rag(e) => match e.kind() {
                ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Provider => StatusCode::BAD_GATEWAY,
                ErrorKind::DataUnavailable | ErrorKind::IndexUnavailable => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
