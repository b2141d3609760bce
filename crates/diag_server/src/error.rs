//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use diag_core::DiagError;

/// Wrapper so core errors convert straight into HTTP responses with `?`.
pub struct AppError(pub DiagError);

impl From<DiagError> for AppError {
    fn from(err: DiagError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "reason": self.0.reason(),
        }));
        (status, body).into_response()
    }
}
