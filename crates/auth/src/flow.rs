//! One-time authorization-code bootstrap.

use crmgate_config::OAuthConfig;
use crmgate_types::{
    GateError, GrantRequest, Token, TokenEndpoint, TokenFields, TokenStore, traits::Result,
};
use std::sync::Arc;

use crate::zoho;

/// Builds the consent URL and turns the returned code into the first token record.
pub struct AuthorizationFlow {
    config: OAuthConfig,
    endpoint: Arc<dyn TokenEndpoint>,
    store: Arc<dyn TokenStore>,
}

impl AuthorizationFlow {
    pub fn new(
        config: OAuthConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            config,
            endpoint,
            store,
        }
    }

    /// The provider consent URL. Pure function of configuration.
    #[must_use]
    pub fn authorization_url(&self) -> String {
        zoho::build_auth_url(&self.config)
    }

    /// Exchange an authorization code and persist the resulting token pair.
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidRequest`] if `code` is empty (no request is sent).
    /// - [`GateError::InvalidProviderResponse`] if the response lacks a refresh token.
    /// - Any classified provider or transport error from the endpoint.
    /// - [`GateError::Persistence`] if the record cannot be written.
    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        let code = code.trim();
        if code.is_empty() {
            return Err(GateError::InvalidRequest(
                "missing authorization code".into(),
            ));
        }

        let grant = self
            .endpoint
            .exchange(&GrantRequest::AuthorizationCode { code: code.into() })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "authorization code exchange failed"))?;

        // Endpoints reject a code response without a refresh token and attach
        // the provider body; this only guards against one that does not.
        let Some(refresh_token) = grant.refresh_token.filter(|r| !r.is_empty()) else {
            let err = GateError::InvalidProviderResponse {
                reason: "token endpoint returned no refresh_token for authorization_code".into(),
                body: String::new(),
            };
            tracing::error!(error = %err, "authorization code exchange unusable");
            return Err(err);
        };

        let token = self
            .store
            .append(&TokenFields {
                access_token: grant.access_token,
                refresh_token,
                expires_in: grant.expires_in,
            })
            .await?;

        tracing::info!(
            id = token.id,
            expires_in = token.expires_in,
            "authorization completed, token stored"
        );
        Ok(token)
    }
}
