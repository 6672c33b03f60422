//! `/auth/*` route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use crmgate_auth::TokenStatus;
use crmgate_types::GateError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct AuthUrlResponse {
    pub authorization_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Token pair returned once the consent round-trip completes.
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub created_at: u64,
}

/// Handles `GET /auth` and `GET /auth/zoho`.
pub async fn authorization_url(State(state): State<Arc<AppState>>) -> Json<AuthUrlResponse> {
    Json(AuthUrlResponse {
        authorization_url: state.flow.authorization_url(),
    })
}

/// Handles `GET /auth/callback?code=...`.
///
/// The consent screen redirects here with either `code` or `error`.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>, ApiError> {
    if let Some(err) = params.error {
        tracing::warn!(error = %err, "consent denied or failed");
        return Err(GateError::InvalidRequest(format!("authorization failed: {err}")).into());
    }
    let code = params
        .code
        .ok_or_else(|| GateError::InvalidRequest("missing authorization code".into()))?;

    let token = state.flow.exchange_code(&code).await?;
    Ok(Json(CallbackResponse {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_in: token.expires_in,
        created_at: token.created_at,
    }))
}

/// Handles `GET /auth/status`.
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<TokenStatus>, ApiError> {
    Ok(Json(state.auth.status().await?))
}
