//! JSON error responses.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use fieldops_core::equipment::EquipmentError;
use fieldops_shared::AppError;

/// Build a `{"error", "message"}` response.
pub fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message
        })),
    )
        .into_response()
}

/// Handler error, rendered from an [`AppError`].
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        json_error(status, self.0.error_code(), &self.0.public_message())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<EquipmentError> for ApiError {
    fn from(err: EquipmentError) -> Self {
        Self(err.into())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self(AppError::Validation(err.to_string()))
    }
}

/// Multipart body errors keep the status axum assigns, so an oversized
/// upload is reported as 413.
pub fn multipart_error(err: &MultipartError) -> Response {
    json_error(err.status(), "INVALID_MULTIPART", &err.body_text())
}
