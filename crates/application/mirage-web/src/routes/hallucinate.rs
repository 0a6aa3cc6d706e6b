//! `POST /hallucinate`
//!
//! Always answers 200 with a redirect target; the browser navigates either to
//! the new page or back to the form with `?error=1`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::{AppState, ValidationFailure};

pub const MAX_CONTEXT_CHARS: usize = 32;
const API_KEY_PREFIX: &str = "sk-";
const ERROR_REDIRECT: &str = "/?error=1";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/hallucinate", post(hallucinate))
}

#[derive(Deserialize)]
pub struct HallucinateRequest {
    pub context: String,
    #[serde(rename = "openAIAPIKey")]
    pub api_key: String,
}

/// Validated request: the context trimmed, the key untouched
#[derive(Debug, PartialEq, Eq)]
pub struct Validated<'a> {
    pub context: &'a str,
    pub api_key: &'a str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub redirect_to: String,
}

impl HallucinateRequest {
    pub fn validate(&self) -> Result<Validated<'_>, ValidationFailure> {
        let context = self.context.trim();
        let len = context.chars().count();
        if len == 0 || len > MAX_CONTEXT_CHARS {
            return Err(ValidationFailure::Context {
                max: MAX_CONTEXT_CHARS,
            });
        }
        if !self.api_key.starts_with(API_KEY_PREFIX) {
            return Err(ValidationFailure::ApiKey);
        }
        Ok(Validated {
            context,
            api_key: &self.api_key,
        })
    }
}

async fn hallucinate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HallucinateRequest>, JsonRejection>,
) -> Json<Redirect> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Rejected /hallucinate body: {}", rejection.body_text());
            return error_redirect();
        }
    };

    let validated = match request.validate() {
        Ok(validated) => validated,
        Err(e) => {
            tracing::debug!("Rejected /hallucinate request: {}", e);
            return error_redirect();
        }
    };

    match state
        .pipeline
        .run(validated.api_key, validated.context)
        .await
    {
        Ok(identifier) => Json(Redirect {
            redirect_to: format!("/results/{}", identifier),
        }),
        Err(e) => {
            tracing::warn!(context = %validated.context, "Generation failed: {}", e);
            error_redirect()
        }
    }
}

fn error_redirect() -> Json<Redirect> {
    Json(Redirect {
        redirect_to: ERROR_REDIRECT.to_string(),
    })
}
