//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use safesprint_core::config::SafeSprintConfig;
use safesprint_core::error::SafeSprintError;

use crate::auth::{require_leader, LEADER_KEY_HEADER};
use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
///
/// # Arguments
/// * `state` - The shared application state.
///
/// # Returns
/// A fully configured axum Router ready to serve requests.
pub fn create_router(state: AppState) -> Router {
    // CORS: allow the local UI on the configured port plus port+1 for a dev server.
    let port = state.config.server.port;
    let dev_port = port.saturating_add(1);
    let origins: Vec<HeaderValue> = [port, dev_port]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(LEADER_KEY_HEADER),
        ]);

    // Setup and participant routes. Participants authenticate by access code.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/presets", get(handlers::presets))
        .route("/sessions", post(handlers::create_session))
        .route("/login", post(handlers::login))
        .route("/participants/{id}/interview", get(handlers::interview))
        .route("/participants/{id}/messages", post(handlers::send_message))
        .route("/participants/{id}/finalize", post(handlers::finalize));

    // Leader routes, gated on the session's leader key.
    let leader_routes = Router::new()
        .route("/sessions/{id}/dashboard", get(handlers::dashboard))
        .route("/sessions/{id}/progress", get(handlers::progress))
        .route("/sessions/{id}/progress/stream", get(handlers::progress_stream))
        .route(
            "/sessions/{id}/report",
            get(handlers::get_report).post(handlers::create_report),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_leader,
        ));

    let body_limit = state.config.server.max_body_bytes;

    public_routes
        .merge(leader_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(config: &SafeSprintConfig, state: AppState) -> Result<(), SafeSprintError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SafeSprintError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| SafeSprintError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
