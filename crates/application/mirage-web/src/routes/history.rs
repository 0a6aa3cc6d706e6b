//! Global history: `GET /history` renders the first page as HTML and
//! `/js/history.js` pages through the rest of the visible window with
//! `POST /history`.

use std::sync::Arc;

use askama::Template;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use mirage_store::ArtifactEntry;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AppState, ValidationFailure};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/history", get(history_page).post(history_json))
}

#[derive(Template)]
#[template(path = "history.html")]
struct HistoryTemplate {
    entries: Vec<HistoryEntry>,
    /// First page the script should request
    next_page: usize,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryRequest {
    #[serde(default)]
    page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub filename: String,
    /// Modification time, milliseconds since the Unix epoch
    pub time: u64,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub history: Vec<HistoryEntry>,
}

impl From<ArtifactEntry> for HistoryEntry {
    fn from(entry: ArtifactEntry) -> Self {
        Self {
            time: entry.modified_millis(),
            filename: entry.identifier.into_string(),
        }
    }
}

async fn history_page(State(state): State<Arc<AppState>>) -> Response {
    let entries = match state.store().list(0, state.history_page_size).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Failed to list history: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let template = HistoryTemplate {
        entries: entries.into_iter().map(HistoryEntry::from).collect(),
        next_page: 1,
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render history: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// An empty body means page 0.
fn parse_page(body: &[u8]) -> Result<usize, ValidationFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(0);
    }
    let request: HistoryRequest =
        serde_json::from_slice(body).map_err(|e| ValidationFailure::Body(e.to_string()))?;
    Ok(request.page.unwrap_or(0))
}

async fn history_json(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let page = match parse_page(&body) {
        Ok(page) => page,
        Err(e) => return e.into_response(),
    };

    match state.store().list(page, state.history_page_size).await {
        Ok(entries) => Json(HistoryPage {
            history: entries.into_iter().map(HistoryEntry::from).collect(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(page, "Failed to list history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to read history" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn seed(app: &TestApp, names: &[&str]) {
        let results = app.state.store().dir().to_path_buf();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for (i, name) in names.iter().enumerate() {
            let path = results.join(format!("{}.html", name));
            std::fs::write(&path, "<p>x</p>").unwrap();
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(base + Duration::from_secs(i as u64 * 10))
                .unwrap();
        }
    }

    fn filenames(json: &serde_json::Value) -> Vec<String> {
        json["history"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["filename"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(b""), Ok(0));
        assert_eq!(parse_page(b"  \n"), Ok(0));
        assert_eq!(parse_page(b"{}"), Ok(0));
        assert_eq!(parse_page(br#"{"page":null}"#), Ok(0));
        assert_eq!(parse_page(br#"{"page":4}"#), Ok(4));
        assert!(parse_page(br#"{"page":-1}"#).is_err());
        assert!(parse_page(br#"{"page":1.5}"#).is_err());
        assert!(parse_page(br#"{"page":"2"}"#).is_err());
        assert!(parse_page(b"[").is_err());
    }

    #[tokio::test]
    async fn test_pages_newest_first_within_window() {
        // max_files 10 -> window 7, page size 3
        let app = TestApp::new(FakeCompletions::default()).await;
        let names: Vec<String> = (0..10).map(|i| format!("page-{:08x}", i)).collect();
        seed(&app, &names.iter().map(String::as_str).collect::<Vec<_>>());

        let mut seen = Vec::new();
        for page in 0.. {
            let body = json!({ "page": page }).to_string();
            let json = body_json(app.send(post_json("/history", &body)).await).await;
            let batch = filenames(&json);
            if batch.is_empty() {
                break;
            }
            assert!(batch.len() <= 3);
            seen.extend(batch);
        }

        let expected: Vec<String> = names.iter().rev().take(7).cloned().collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_time_is_epoch_millis() {
        let app = TestApp::new(FakeCompletions::default()).await;
        seed(&app, &["page-a1b2c3d4"]);

        let response = app.send(post_json("/history", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(filenames(&json), ["page-a1b2c3d4"]);

        let time = json["history"][0]["time"].as_u64().unwrap();
        let expected = (SystemTime::now() - Duration::from_secs(3600))
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        assert!(time.abs_diff(expected) < 60_000);
    }

    #[tokio::test]
    async fn test_malformed_page_is_bad_request() {
        let app = TestApp::new(FakeCompletions::default()).await;
        let response = app.send(post_json("/history", r#"{"page":-1}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_history_page_lists_links() {
        let app = TestApp::new(FakeCompletions::default()).await;
        seed(&app, &["older-00000001", "newer-00000002"]);

        let response = app.send(crate::testing::get("/history")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;

        let newer = html.find(r#"href="/results/newer-00000002""#).unwrap();
        let older = html.find(r#"href="/results/older-00000001""#).unwrap();
        assert!(newer < older);
        assert!(html.contains(r#"<script src="/js/history.js"></script>"#));
    }

    #[tokio::test]
    async fn test_history_page_renders_first_page_only() {
        // page size 3; the script continues from page 1
        let app = TestApp::new(FakeCompletions::default()).await;
        let names: Vec<String> = (0..10).map(|i| format!("page-{:08x}", i)).collect();
        seed(&app, &names.iter().map(String::as_str).collect::<Vec<_>>());

        let html = body_string(app.send(crate::testing::get("/history")).await).await;
        assert!(html.contains(r#"<div id="history" data-next-page="1">"#));
        assert_eq!(html.matches(r#"href="/results/"#).count(), 3);
        for name in names.iter().rev().take(3) {
            assert!(html.contains(&format!(r#"href="/results/{}""#, name)), "{}", name);
        }
        assert!(!html.contains(r#"href="/results/page-00000006""#));
        assert!(html.contains("data-time=\""));
        assert!(!html.contains("Nothing has been hallucinated yet."));

        let second = json!({ "page": 1 }).to_string();
        let json = body_json(app.send(post_json("/history", &second)).await).await;
        assert_eq!(filenames(&json), ["page-00000006", "page-00000005", "page-00000004"]);
    }

    #[tokio::test]
    async fn test_history_page_empty_store() {
        let app = TestApp::new(FakeCompletions::default()).await;
        let html = body_string(app.send(crate::testing::get("/history")).await).await;
        assert!(html.contains("Nothing has been hallucinated yet."));
        assert_eq!(html.matches(r#"href="/results/"#).count(), 0);
    }
}
