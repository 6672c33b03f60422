//! HTTP implementation of [`TokenEndpoint`] for the Zoho accounts server.

use async_trait::async_trait;
use crmgate_config::OAuthConfig;
use crmgate_types::{GateError, GrantRequest, TokenEndpoint, TokenGrant, traits::Result};
use std::time::Duration;

use crate::zoho;

/// Posts form-encoded grants to `{api_domain}/oauth/v2/token`.
///
/// Every request is bounded by the client timeout; a timeout surfaces as
/// [`GateError::UpstreamExchangeFailure`] with no status.
pub struct HttpTokenEndpoint {
    http: reqwest::Client,
    config: OAuthConfig,
    timeout: Duration,
}

impl HttpTokenEndpoint {
    /// Build an endpoint with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] if the HTTP client cannot be constructed.
    pub fn new(config: OAuthConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            timeout,
        })
    }

    fn transport_error(&self, e: &reqwest::Error) -> GateError {
        let body = if e.is_timeout() {
            format!("timed out after {}ms: {e}", self.timeout.as_millis())
        } else {
            e.to_string()
        };
        GateError::UpstreamExchangeFailure { status: None, body }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange(&self, request: &GrantRequest) -> Result<TokenGrant> {
        let url = zoho::token_url(&self.config);
        let params = zoho::token_form_params(&self.config, request);

        let resp = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| self.transport_error(&e))?;

        zoho::parse_grant_response(request, status, &body).inspect_err(|e| {
            tracing::warn!(
                grant_type = request.grant_type(),
                status,
                error = %e,
                "token endpoint returned an error"
            );
        })
    }
}
