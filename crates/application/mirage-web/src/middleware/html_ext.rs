//! Extension-less static paths
//!
//! `GET /results/cat-facts-1a2b3c4d` serves `/results/cat-facts-1a2b3c4d.html`.
//! Only applied in front of the static file service, so API routes such as
//! `/health` are matched before any rewrite happens.

use axum::extract::Request;
use axum::http::{Method, Uri};

/// Paths that keep their own meaning without an extension
const EXEMPT: &[&str] = &["/", "/history"];

pub fn rewrite_extensionless(mut req: Request) -> Request {
    if req.method() != Method::GET {
        return req;
    }
    if let Some(uri) = with_html_extension(req.uri()) {
        *req.uri_mut() = uri;
    }
    req
}

fn with_html_extension(uri: &Uri) -> Option<Uri> {
    let path = uri.path();
    if EXEMPT.contains(&path) || path.ends_with('/') || has_extension(path) {
        return None;
    }

    let rewritten = match uri.query() {
        Some(query) => format!("{}.html?{}", path, query),
        None => format!("{}.html", path),
    };
    rewritten.parse().ok()
}

fn has_extension(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    // A leading dot names a hidden file, not an extension.
    matches!(name.rfind('.'), Some(i) if i > 0 && i + 1 < name.len())
}
