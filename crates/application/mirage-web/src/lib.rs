//! Mirage Web
//!
//! HTTP surface over the result store and the generation pipeline.
//!
//! ## Routes
//!
//! - `POST /hallucinate` generate a page, answer with where to find it
//! - `GET  /history`     HTML list of the visible history window
//! - `POST /history`     one JSON page of history
//! - `POST /suggestions` ten sample contexts
//! - `GET  /health`      liveness
//! - everything else     static files from the public directory, with
//!   extension-less GETs resolved to `.html`

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower::Layer;
use tower::util::MapRequestLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::ValidationFailure;
pub use middleware::rate_limit::RateLimiter;
pub use state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = MapRequestLayer::new(middleware::html_ext::rewrite_extensionless)
        .layer(ServeDir::new(&state.public_dir));

    Router::new()
        .merge(routes::hallucinate::router())
        .merge(routes::history::router())
        .merge(routes::suggestions::router())
        .merge(routes::health::router())
        .fallback_service(static_files)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::enforce,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<F>(state: Arc<AppState>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Mirage listening on http://{}", addr);
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
}
