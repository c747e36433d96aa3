pub mod api;
pub mod app_state;
pub mod config;
pub mod policy;
pub mod signing;
pub mod storage;

use anyhow::Context;
use axum::Router;
use axum::body::Body;
use axum::extract::Extension;
use axum::http::{Method, Request};
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

//
// Re-export
//
pub use api::{handle_request, log_request_errors};
pub use app_state::AppState;
pub use config::{Config, Secret};
pub use policy::{Policy, classify};
pub use signing::{
    SignedUrl, SigningError, SigningKey, Token, TokenError, UrlSigner, VerifyError,
};
pub use storage::{ObjectMeta, StorageBackend, StorageConfig, StorageManager};

/// Build the HTTP router over shared state
pub fn router(state: AppState) -> Router {
    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers(Any);

    // Spans carry the path only; the query may hold a token
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        info_span!("request", method = %req.method(), path = %req.uri().path())
    });

    Router::new()
        .route("/", get(handle_request))
        .route("/{*path}", get(handle_request))
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(trace)
        .layer(cors)
        .layer(Extension(state))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.listen_on_port);
    info!("Listening on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await?;
    Ok(())
}
