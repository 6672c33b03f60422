use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use crmgate_auth::{AuthManager, AuthorizationFlow, HttpTokenEndpoint};
use crmgate_config::Config;
use crmgate_proxy::AppState;
use crmgate_store::SqliteTokenStore;
use crmgate_types::{TokenEndpoint, TokenStore};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crmgate", about = "crmgate: Zoho OAuth token lifecycle backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Common {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// SQLite database path (default: ~/.crmgate/tokens.db).
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        #[command(flatten)]
        common: Common,
        /// Override the listening port (default: 3000).
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listening address (default: 127.0.0.1).
        #[arg(long)]
        host: Option<String>,
    },
    /// Print the Zoho consent URL.
    AuthUrl {
        #[command(flatten)]
        common: Common,
    },
    /// Exchange an authorization code for the first token pair.
    Exchange {
        /// The `code` query parameter from the consent redirect.
        code: String,
        #[command(flatten)]
        common: Common,
    },
    /// Show the stored token records (no secrets).
    Status {
        #[command(flatten)]
        common: Common,
    },
    /// Refresh the access token now, regardless of expiry.
    Refresh {
        #[command(flatten)]
        common: Common,
    },
}

/// Everything a command needs, built from configuration.
struct Runtime {
    config: Config,
    flow: Arc<AuthorizationFlow>,
    auth: Arc<AuthManager>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { common, port, host } => cmd_serve(common, port, host).await,
        Commands::AuthUrl { common } => cmd_auth_url(common).await,
        Commands::Exchange { code, common } => cmd_exchange(&code, common).await,
        Commands::Status { common } => cmd_status(common).await,
        Commands::Refresh { common } => cmd_refresh(common).await,
    }
}

async fn cmd_serve(common: Common, port: Option<u16>, host: Option<String>) -> Result<()> {
    let Runtime {
        mut config,
        flow,
        auth,
    } = build_runtime(common).await?;

    if let Some(p) = port {
        config.port = p;
    }
    if let Some(h) = host {
        config.host = h;
    }

    let addr = format!("{}:{}", config.host, config.port);
    let app = crmgate_proxy::make_router(AppState::new(flow, auth));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "crmgate listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn cmd_auth_url(common: Common) -> Result<()> {
    let rt = build_runtime(common).await?;
    println!("{}", rt.flow.authorization_url());
    Ok(())
}

async fn cmd_exchange(code: &str, common: Common) -> Result<()> {
    let rt = build_runtime(common).await?;
    let token = rt
        .flow
        .exchange_code(code)
        .await
        .context("authorization code exchange failed")?;
    println!(
        "authenticated: record {} stored, expires in {}s",
        token.id, token.expires_in
    );
    Ok(())
}

async fn cmd_status(common: Common) -> Result<()> {
    let rt = build_runtime(common).await?;
    let status = rt.auth.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn cmd_refresh(common: Common) -> Result<()> {
    let rt = build_runtime(common).await?;
    let token = rt
        .auth
        .force_refresh()
        .await
        .context("token refresh failed")?;
    println!(
        "refreshed: record {} stored, expires in {}s",
        token.id, token.expires_in
    );
    Ok(())
}

/// Load configuration, initialise logging, and wire the store and endpoint.
async fn build_runtime(common: Common) -> Result<Runtime> {
    let config = Config::load(common.config.as_deref()).context("config error")?;
    init_tracing(&config.log_level);

    for field in config.missing_oauth_fields() {
        tracing::warn!(
            field,
            env = %format!("ZOHO_{}", field.to_uppercase()),
            "OAuth setting is empty"
        );
    }

    let store: Arc<dyn TokenStore> =
        Arc::new(open_store(common.db, config.database_url.as_deref()).await?);
    let endpoint: Arc<dyn TokenEndpoint> = Arc::new(HttpTokenEndpoint::new(
        config.oauth.clone(),
        Duration::from_secs(config.http_timeout_secs),
    )?);

    let flow = Arc::new(AuthorizationFlow::new(
        config.oauth.clone(),
        Arc::clone(&endpoint),
        Arc::clone(&store),
    ));
    let auth = Arc::new(AuthManager::new(store, endpoint, config.refresh_margin_secs));
    Ok(Runtime { config, flow, auth })
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_store(db: Option<PathBuf>, database_url: Option<&str>) -> Result<SqliteTokenStore> {
    let url = match (db, database_url) {
        (Some(path), _) => sqlite_url(&path)?,
        (None, Some(url)) => url.to_string(),
        (None, None) => sqlite_url(&default_db_path())?,
    };
    SqliteTokenStore::new(&url)
        .await
        .map_err(|e| anyhow::anyhow!("database error: {e}"))
}

fn sqlite_url(path: &Path) -> Result<String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(format!("sqlite://{}", path.display()))
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".crmgate").join("tokens.db")
}
