//! Request validation failures

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// A request body that does not match what the route accepts.
///
/// `/hallucinate` folds these into its error redirect; `/history` answers
/// with a 400 through [`IntoResponse`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("malformed request body: {0}")]
    Body(String),

    #[error("context must be between 1 and {max} characters once trimmed")]
    Context { max: usize },

    #[error("API key must start with \"sk-\"")]
    ApiKey,
}

impl IntoResponse for ValidationFailure {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
