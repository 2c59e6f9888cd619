use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::chain::ChainError;
use crate::types::FeedAvailability;

/// Errors surfaced to API callers as `{"error": "..."}`. Never mutates state.
#[derive(Debug)]
pub enum ApiError {
    /// The live chain feed is not `Ready`.
    ServiceUnavailable(FeedAvailability),
    /// Request body is not valid JSON for the endpoint.
    BadRequest(String),
    Chain(ChainError),
}

impl From<ChainError> for ApiError {
    fn from(e: ChainError) -> Self {
        Self::Chain(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::ServiceUnavailable(availability) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("live chain feed unavailable ({availability})"),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Chain(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };
        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
