//! HTTP error mapping: every failure becomes `{"error": code, "message": text}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::api::errors::ClickHouseError;
use crate::auth::AuthError;
use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid request body: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) | Self::Query(QueryError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Self::Query(QueryError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Query(QueryError::Serialization(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            Self::Query(QueryError::Backend(e)) => backend_status(e),
            Self::Auth(AuthError::InvalidToken) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::Auth(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        }
    }
}

fn backend_status(err: &ClickHouseError) -> (StatusCode, &'static str) {
    match err {
        ClickHouseError::Network(_)
        | ClickHouseError::Timeout(_)
        | ClickHouseError::RateLimited { .. }
        | ClickHouseError::MaxRetriesExceeded { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable")
        }
        _ => (StatusCode::BAD_GATEWAY, "backend_error"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
