//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; any [`sf_core::Error`]
//! converts with `?` and is rendered as `{error, code, request_id}` with the
//! status from [`sf_core::Error::http_status`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::middleware::request_id::current_request_id;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: sf_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: sf_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<sf_core::Error> for AppError {
    fn from(e: sf_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Request failed");
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id.or_else(current_request_id),
        });

        (status, axum::Json(body)).into_response()
    }
}
