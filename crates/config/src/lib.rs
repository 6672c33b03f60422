//! Configuration loading for the crmgate server.
//!
//! Uses figment to layer built-in defaults, an optional YAML file and the
//! environment (`ZOHO_*` for the OAuth client, `CRMGATE_*` for the server).

pub mod schema;

pub use schema::{Config, OAuthConfig};
