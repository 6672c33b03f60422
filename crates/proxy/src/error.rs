//! API error type that maps [`GateError`] variants to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crmgate_types::GateError;
use serde_json::json;

/// Wrapper around [`GateError`] that implements [`IntoResponse`].
pub struct ApiError(pub GateError);

impl ApiError {
    /// Returns `(status, error_type, error_code)` for the wrapped error.
    fn classify(&self) -> (StatusCode, &'static str, &'static str) {
        match &self.0 {
            GateError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "not_authenticated",
            ),
            GateError::InvalidGrant { .. } => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "reauthentication_required",
            ),
            GateError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "rate_limit_exceeded",
            ),
            GateError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
            ),
            GateError::UpstreamExchangeFailure { .. } => {
                (StatusCode::BAD_GATEWAY, "server_error", "upstream_error")
            }
            GateError::InvalidProviderResponse { .. } => (
                StatusCode::BAD_GATEWAY,
                "server_error",
                "invalid_provider_response",
            ),
            GateError::ProviderRejected { .. } => {
                (StatusCode::BAD_GATEWAY, "server_error", "provider_rejected")
            }
            GateError::Persistence(_) | GateError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal_error",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, error_code) = self.classify();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = error_code, "request failed");
        }
        let msg = self.0.to_string();
        (
            status,
            Json(json!({
                "error": {
                    "message": msg,
                    "type": error_type,
                    "code": error_code,
                }
            })),
        )
            .into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        Self(e)
    }
}
