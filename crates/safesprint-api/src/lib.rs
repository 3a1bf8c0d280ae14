//! SafeSprint API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Exposes session setup, participant login and interviews, the leader
//! dashboard with a live progress stream, and report synthesis over REST.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
