use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Error surface of the JSON API. Every variant renders as
/// `{"error": ...}` with the matching status code.
#[derive(Debug)]
pub enum ApiError {
    /// A required field is missing or malformed. Carries the fixed
    /// message the client sees.
    BadRequest(&'static str),
    /// The resource does not exist for this user. Ownership misses land
    /// here too; the two cases are deliberately indistinguishable.
    NotFound,
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Internal(source) => {
                error!("Request failed: {source:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{source:#}"))
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(source: anyhow::Error) -> Self {
        Self::Internal(source)
    }
}
