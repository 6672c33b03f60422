use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// OAuth client registration with the provider.
///
/// Every field defaults to an empty string: the authorization URL is still
/// built from whatever is present, and the server only warns about gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Provider base URL, e.g. `https://accounts.zoho.com`.
    pub api_domain: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Space- or comma-separated scope string, passed through verbatim.
    pub scope: String,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_timeout_secs() -> u64 {
    30
}
fn default_refresh_margin_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port (defaults to 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen address (defaults to `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    /// sqlx `SQLite` URL for the token log. The binary picks a per-user path
    /// when unset.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Upper bound on every token endpoint request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Seconds before expiry at which a token is treated as stale. `0` means
    /// refresh only once the token has actually expired.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            database_url: None,
            http_timeout_secs: default_http_timeout_secs(),
            refresh_margin_secs: default_refresh_margin_secs(),
            log_level: default_log_level(),
            oauth: OAuthConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then the YAML file at `path` (if any), then the environment.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("ZOHO_").map(|key| format!("oauth.{key}").into()))
            .merge(Env::prefixed("CRMGATE_").split("__"))
    }

    /// Loads the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be parsed or a value has
    /// the wrong type.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Names of OAuth settings that are empty.
    #[must_use]
    pub fn missing_oauth_fields(&self) -> Vec<&'static str> {
        let o = &self.oauth;
        [
            ("api_domain", &o.api_domain),
            ("client_id", &o.client_id),
            ("client_secret", &o.client_secret),
            ("redirect_uri", &o.redirect_uri),
            ("scope", &o.scope),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}
