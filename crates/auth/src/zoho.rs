//! Zoho OAuth 2.0 authorization-code flow: URLs, form bodies and response parsing.
//!
//! Zoho reports most token errors as `{"error": "..."}` with HTTP 200, and
//! answers refresh grants without a `refresh_token`. Both quirks are handled in
//! [`parse_token_response`], which is the only place raw provider strings are
//! inspected.

use crmgate_config::OAuthConfig;
use crmgate_types::{GateError, GrantRequest, TokenGrant, traits::Result};
use serde::Deserialize;

/// Consent page, relative to the configured domain.
pub const AUTH_PATH: &str = "/oauth/v2/auth";

/// Token endpoint, relative to the configured domain.
pub const TOKEN_PATH: &str = "/oauth/v2/token";

/// Flow parameters fixed by this integration.
pub const RESPONSE_TYPE: &str = "code";
pub const ACCESS_TYPE: &str = "offline";
pub const PROMPT: &str = "consent";

/// Error codes meaning the grant itself is dead.
const INVALID_GRANT_CODES: &[&str] = &["invalid_grant", "invalid_code"];

fn base(config: &OAuthConfig) -> &str {
    config.api_domain.trim_end_matches('/')
}

/// Build the consent URL. Missing configuration yields empty values, never an error.
#[must_use]
pub fn build_auth_url(config: &OAuthConfig) -> String {
    let query = [
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", config.scope.as_str()),
        ("response_type", RESPONSE_TYPE),
        ("access_type", ACCESS_TYPE),
        ("prompt", PROMPT),
    ];
    // Encoding a flat list of string pairs cannot fail.
    let encoded = serde_urlencoded::to_string(query).unwrap_or_default();
    format!("{}{AUTH_PATH}?{encoded}", base(config))
}

/// Absolute token endpoint URL.
#[must_use]
pub fn token_url(config: &OAuthConfig) -> String {
    format!("{}{TOKEN_PATH}", base(config))
}

/// Form body for a token request, client credentials included.
#[must_use]
pub fn token_form_params<'a>(
    config: &'a OAuthConfig,
    request: &'a GrantRequest,
) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![
        ("grant_type", request.grant_type()),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
    ];
    match request {
        GrantRequest::AuthorizationCode { code } => {
            params.push(("redirect_uri", config.redirect_uri.as_str()));
            params.push(("code", code.as_str()));
        }
        GrantRequest::RefreshToken { refresh_token } => {
            params.push(("refresh_token", refresh_token.as_str()));
        }
    }
    params
}

/// `expires_in` arrives either as a number or as a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lifetime {
    Seconds(u64),
    Text(String),
}

impl Lifetime {
    fn seconds(&self) -> Option<u64> {
        match self {
            Self::Seconds(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<Lifetime>,
    error: Option<String>,
    error_description: Option<String>,
}

fn is_rate_limit(code: &str, description: Option<&str>) -> bool {
    let hint = |s: &str| {
        let s = s.to_ascii_lowercase();
        s.contains("too many requests") || s.contains("rate limit")
    };
    hint(code) || description.is_some_and(hint)
}

fn classify_error(status: u16, code: &str, description: Option<&str>, body: &str) -> GateError {
    if INVALID_GRANT_CODES.contains(&code) {
        GateError::InvalidGrant { body: body.into() }
    } else if is_rate_limit(code, description) {
        GateError::RateLimited { body: body.into() }
    } else if status >= 500 {
        GateError::UpstreamExchangeFailure {
            status: Some(status),
            body: body.into(),
        }
    } else {
        GateError::ProviderRejected {
            code: code.into(),
            body: body.into(),
        }
    }
}

fn invalid(reason: &str, body: &str) -> GateError {
    GateError::InvalidProviderResponse {
        reason: reason.into(),
        body: body.into(),
    }
}

/// Classify a token endpoint response.
///
/// # Errors
///
/// - [`GateError::RateLimited`] for HTTP 429 or a throttling description.
/// - [`GateError::InvalidGrant`] for `invalid_grant` / `invalid_code`.
/// - [`GateError::ProviderRejected`] for any other OAuth error code.
/// - [`GateError::UpstreamExchangeFailure`] for other non-2xx statuses.
/// - [`GateError::InvalidProviderResponse`] when a 2xx body lacks
///   `access_token` or an integer `expires_in`.
pub fn parse_token_response(status: u16, body: &str) -> Result<TokenGrant> {
    if status == 429 {
        return Err(GateError::RateLimited { body: body.into() });
    }

    let parsed: Option<TokenResponse> = serde_json::from_str(body).ok();
    let success = (200..300).contains(&status);

    let resp = match parsed {
        Some(resp) => resp,
        None if success => return Err(invalid("body is not a JSON token response", body)),
        None => {
            return Err(GateError::UpstreamExchangeFailure {
                status: Some(status),
                body: body.into(),
            });
        }
    };

    if let Some(code) = resp.error.as_deref() {
        return Err(classify_error(
            status,
            code,
            resp.error_description.as_deref(),
            body,
        ));
    }
    if !success {
        return Err(GateError::UpstreamExchangeFailure {
            status: Some(status),
            body: body.into(),
        });
    }

    let access_token = resp
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid("missing access_token", body))?;
    let expires_in = resp
        .expires_in
        .as_ref()
        .ok_or_else(|| invalid("missing expires_in", body))?
        .seconds()
        .ok_or_else(|| invalid("expires_in is not an integer", body))?;

    Ok(TokenGrant {
        access_token,
        refresh_token: resp.refresh_token.filter(|r| !r.is_empty()),
        expires_in,
    })
}

/// Classify the response to `request`.
///
/// An authorization-code grant is the only source of a refresh token, so its
/// response must carry one.
///
/// # Errors
///
/// Everything [`parse_token_response`] returns, plus
/// [`GateError::InvalidProviderResponse`] for an authorization-code response
/// without `refresh_token`. The raw body is attached in every case.
pub fn parse_grant_response(request: &GrantRequest, status: u16, body: &str) -> Result<TokenGrant> {
    let grant = parse_token_response(status, body)?;
    if matches!(request, GrantRequest::AuthorizationCode { .. }) && grant.refresh_token.is_none() {
        return Err(invalid(
            "missing refresh_token in authorization_code response",
            body,
        ));
    }
    Ok(grant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> OAuthConfig {
        OAuthConfig {
            api_domain: "https://accounts.zoho.com".into(),
            client_id: "1000.CLIENT".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:3000/auth/callback".into(),
            scope: "ZohoCRM.modules.ALL,ZohoMail.accounts.READ".into(),
        }
    }

    fn query_of(url: &str) -> HashMap<String, String> {
        let (_, query) = url.split_once('?').unwrap();
        serde_urlencoded::from_str(query).unwrap()
    }

    #[test]
    fn test_auth_url_has_exactly_the_expected_params() {
        let url = build_auth_url(&config());
        assert!(url.starts_with("https://accounts.zoho.com/oauth/v2/auth?"));
        let q = query_of(&url);
        assert_eq!(q.len(), 6);
        assert_eq!(q["client_id"], "1000.CLIENT");
        assert_eq!(q["redirect_uri"], "http://localhost:3000/auth/callback");
        assert_eq!(q["scope"], "ZohoCRM.modules.ALL,ZohoMail.accounts.READ");
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["access_type"], "offline");
        assert_eq!(q["prompt"], "consent");
        assert!(!q.contains_key("client_secret"));
    }

    #[test]
    fn test_auth_url_is_deterministic() {
        assert_eq!(build_auth_url(&config()), build_auth_url(&config()));
    }

    #[test]
    fn test_auth_url_with_empty_config() {
        let url = build_auth_url(&OAuthConfig::default());
        assert!(url.starts_with("/oauth/v2/auth?"));
        let q = query_of(&url);
        assert_eq!(q["client_id"], "");
        assert_eq!(q["redirect_uri"], "");
        assert_eq!(q["scope"], "");
        assert_eq!(q["prompt"], "consent");
    }

    #[test]
    fn test_trailing_slash_in_domain() {
        let mut c = config();
        c.api_domain = "https://accounts.zoho.com/".into();
        assert_eq!(token_url(&c), "https://accounts.zoho.com/oauth/v2/token");
    }

    #[test]
    fn test_authorization_code_form() {
        let c = config();
        let req = GrantRequest::AuthorizationCode { code: "abc".into() };
        let params: HashMap<_, _> = token_form_params(&c, &req).into_iter().collect();
        assert_eq!(params["grant_type"], "authorization_code");
        assert_eq!(params["client_id"], "1000.CLIENT");
        assert_eq!(params["client_secret"], "secret");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/auth/callback");
        assert_eq!(params["code"], "abc");
        assert!(!params.contains_key("refresh_token"));
    }

    #[test]
    fn test_refresh_form() {
        let c = config();
        let req = GrantRequest::RefreshToken {
            refresh_token: "R1".into(),
        };
        let params: HashMap<_, _> = token_form_params(&c, &req).into_iter().collect();
        assert_eq!(params["grant_type"], "refresh_token");
        assert_eq!(params["refresh_token"], "R1");
        assert!(!params.contains_key("code"));
    }

    #[test]
    fn test_parse_full_response() {
        let body = r#"{"access_token":"A","refresh_token":"B","expires_in":3600,"api_domain":"https://www.zohoapis.com","token_type":"Bearer"}"#;
        let grant = parse_token_response(200, body).unwrap();
        assert_eq!(grant.access_token, "A");
        assert_eq!(grant.refresh_token.as_deref(), Some("B"));
        assert_eq!(grant.expires_in, 3600);
    }

    #[test]
    fn test_parse_string_expires_in() {
        let grant = parse_token_response(200, r#"{"access_token":"A","expires_in":"3600"}"#).unwrap();
        assert_eq!(grant.expires_in, 3600);
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_parse_non_numeric_expires_in() {
        let err = parse_token_response(200, r#"{"access_token":"A","expires_in":"soon"}"#)
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidProviderResponse { .. }));
    }

    #[test]
    fn test_parse_missing_access_token() {
        let err = parse_token_response(200, r#"{"expires_in":3600}"#).unwrap_err();
        match err {
            GateError::InvalidProviderResponse { reason, body } => {
                assert!(reason.contains("access_token"));
                assert!(body.contains("expires_in"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_expires_in() {
        let err = parse_token_response(200, r#"{"access_token":"A"}"#).unwrap_err();
        assert!(matches!(err, GateError::InvalidProviderResponse { .. }));
    }

    #[test]
    fn test_parse_non_json_success() {
        let err = parse_token_response(200, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, GateError::InvalidProviderResponse { .. }));
    }

    #[test]
    fn test_invalid_code_on_http_200() {
        let err = parse_token_response(200, r#"{"error":"invalid_code"}"#).unwrap_err();
        assert!(matches!(err, GateError::InvalidGrant { .. }));
    }

    #[test]
    fn test_invalid_grant_on_http_400() {
        let err = parse_token_response(400, r#"{"error":"invalid_grant"}"#).unwrap_err();
        match err {
            GateError::InvalidGrant { body } => assert!(body.contains("invalid_grant")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rate_limit_status() {
        let err = parse_token_response(429, "slow down").unwrap_err();
        assert!(matches!(err, GateError::RateLimited { .. }));
    }

    #[test]
    fn test_rate_limit_description() {
        let body = r#"{"error_description":"You have made too many requests continuously. Please try again after some time.","error":"Access Denied","status":"failure"}"#;
        let err = parse_token_response(400, body).unwrap_err();
        assert!(matches!(err, GateError::RateLimited { .. }));
    }

    #[test]
    fn test_other_error_code() {
        let err = parse_token_response(200, r#"{"error":"invalid_client"}"#).unwrap_err();
        match err {
            GateError::ProviderRejected { code, .. } => assert_eq!(code, "invalid_client"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_server_error_is_upstream_failure() {
        let err = parse_token_response(503, "Service Unavailable").unwrap_err();
        match err {
            GateError::UpstreamExchangeFailure { status, body } => {
                assert_eq!(status, Some(503));
                assert_eq!(body, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_code_grant_requires_refresh_token() {
        let req = GrantRequest::AuthorizationCode { code: "abc".into() };
        let body = r#"{"access_token":"A","expires_in":3600,"api_domain":"https://www.zohoapis.com"}"#;
        match parse_grant_response(&req, 200, body).unwrap_err() {
            GateError::InvalidProviderResponse { reason, body: attached } => {
                assert!(reason.contains("refresh_token"));
                assert_eq!(attached, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_refresh_grant_may_omit_refresh_token() {
        let req = GrantRequest::RefreshToken {
            refresh_token: "R1".into(),
        };
        let grant = parse_grant_response(&req, 200, r#"{"access_token":"A2","expires_in":3600}"#)
            .unwrap();
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_server_error_with_error_code() {
        let err = parse_token_response(500, r#"{"error":"server_error"}"#).unwrap_err();
        assert!(matches!(
            err,
            GateError::UpstreamExchangeFailure {
                status: Some(500),
                ..
            }
        ));
    }
}
