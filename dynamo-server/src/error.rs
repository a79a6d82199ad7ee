use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use dynamo_core::Error;

use crate::dto::ErrorResponse;

/// Wraps `dynamo_core::Error` so it can implement axum's `IntoResponse`
/// (the orphan rule blocks implementing a foreign trait for a foreign type).
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::InsufficientReplicas(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
