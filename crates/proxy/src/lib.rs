//! HTTP layer: axum router, route handlers, and error mapping.
//!
//! Exposes the one-time Zoho consent round-trip under `/auth` and a
//! diagnostic `/auth/status` view of the token log.

mod error;
mod handlers;

pub use error::ApiError;

use axum::{Router, routing::get};
use crmgate_auth::{AuthManager, AuthorizationFlow};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state passed to all route handlers.
pub struct AppState {
    /// Consent URL building and authorization-code exchange.
    pub flow: Arc<AuthorizationFlow>,
    /// Token lifecycle manager.
    pub auth: Arc<AuthManager>,
}

impl AppState {
    /// Creates a new shared application state wrapped in an `Arc`.
    pub fn new(flow: Arc<AuthorizationFlow>, auth: Arc<AuthManager>) -> Arc<Self> {
        Arc::new(Self { flow, auth })
    }
}

/// Build the full axum router.
///
/// Routes:
/// - GET /auth              consent URL
/// - GET /auth/zoho         alias of `/auth`
/// - GET /auth/callback     authorization-code exchange
/// - GET /auth/status       token log metadata, no secrets
pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth", get(handlers::authorization_url))
        .route("/auth/zoho", get(handlers::authorization_url))
        .route("/auth/callback", get(handlers::callback))
        .route("/auth/status", get(handlers::status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
