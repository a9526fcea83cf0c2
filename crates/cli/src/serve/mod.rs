//! `provisioner serve` -- HTTP entry point for the orchestrator.
//!
//! Endpoints:
//! - GET     /health  - Server status (exempt from auth)
//! - POST    /submit  - Provision the requested services
//! - OPTIONS /submit  - CORS preflight
//!
//! Every response carries the CORS headers for the one configured origin.
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use self::handlers::{handle_health, handle_not_found, handle_submit};
use self::middleware::auth_middleware;
use self::state::AppState;
use crate::backend::Backend;
use crate::config::ServerConfig;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

const ALLOWED_HEADERS: &str = "Content-Type";
const ALLOWED_METHODS: &str = "OPTIONS,POST";

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the application router.
///
/// `CorsLayer` answers every OPTIONS request itself and stamps
/// `Access-Control-Allow-Origin`. The two outermost layers set
/// `Access-Control-Allow-Headers: Content-Type` and
/// `Access-Control-Allow-Methods: OPTIONS,POST` on every response, preflight
/// or not.
fn router(state: Arc<AppState>, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(allowed_origin))
        .allow_methods([Method::OPTIONS, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/submit", post(handle_submit))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .with_state(state)
}

/// Start the HTTP server.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(
    config: ServerConfig,
    backend: Backend,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<()> {
    let allowed_origin = HeaderValue::from_str(&config.allowed_origin)
        .with_context(|| format!("invalid allowed origin '{}'", config.allowed_origin))?;

    let api_key = backend.api_key(&config).await?;
    if api_key.is_some() {
        info!("API key authentication enabled");
    }

    let state = Arc::new(AppState {
        orchestrator: backend.orchestrator,
        api_key,
    });
    let app = router(state, allowed_origin);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        origin = %config.allowed_origin,
        timeout_secs = config.timeout_secs,
        "Provisioner configured"
    );

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .context("failed to load TLS certificate")?;
        info!("Provisioner listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Provisioner listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
