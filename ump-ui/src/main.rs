//! ump-ui - University Media Platform web front end
//!
//! Serves media, channel and playlist pages, RSS feeds and player
//! configuration. Administrative subcommands manage sessions and super
//! capabilities in the same database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ump_common::config::{load_toml_config, resolve_root_folder, RootFolderInitializer, TomlConfig};
use ump_common::db::init_database;
use ump_common::lookup::{IdentityLookup, LookupProxyClient, NoLookup};
use ump_common::session::{
    create_session, grant_capability, purge_expired_sessions, revoke_capability,
};
use ump_common::Capability;
use ump_ui::{build_router, spawn_session_purge, AppState, UiSettings};

#[derive(Debug, Parser)]
#[command(name = "ump-ui", version, about = "University Media Platform web front end")]
struct Cli {
    /// Root folder holding the database
    #[arg(long, global = true)]
    root_folder: Option<String>,

    /// Configuration file
    #[arg(long, global = true, env = "UMP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a login session and print its token
    CreateSession {
        #[arg(long)]
        crsid: String,
        /// Session lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Grant a super capability such as `view_mediaitem`
    Grant {
        #[arg(long)]
        crsid: String,
        #[arg(long)]
        capability: Capability,
    },
    /// Revoke a super capability
    Revoke {
        #[arg(long)]
        crsid: String,
        #[arg(long)]
        capability: Capability,
    },
    /// Delete expired sessions
    PurgeSessions,
}

/// How often the server sweeps expired sessions
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn identity_lookup(config: &TomlConfig) -> Result<Arc<dyn IdentityLookup>> {
    match &config.lookup.base_url {
        Some(base_url) => {
            let client = LookupProxyClient::new(base_url.clone(), config.lookup.timeout())
                .context("Failed to build lookup client")?;
            info!("Identity lookup via {}", base_url);
            Ok(Arc::new(client))
        }
        None => {
            warn!("No lookup service configured; group and institution grants will not match");
            Ok(Arc::new(NoLookup))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is needed before tracing for the log level; load errors surface after init
    let config = load_toml_config(cli.config.as_deref());
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);
    let config = config.context("Failed to load configuration")?;

    info!(
        "Starting University Media Platform UI (ump-ui) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(cli.root_folder.as_deref(), &config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path).await?;
    info!("✓ Database ready");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, &config).await,
        Command::CreateSession { crsid, hours } => {
            let ttl = chrono::Duration::try_hours(hours)
                .with_context(|| format!("Session lifetime of {} hours is out of range", hours))?;
            let token = create_session(&pool, &crsid, ttl).await?;
            println!("{}", token);
            Ok(())
        }
        Command::Grant { crsid, capability } => {
            grant_capability(&pool, &crsid, capability).await?;
            Ok(())
        }
        Command::Revoke { crsid, capability } => {
            if !revoke_capability(&pool, &crsid, capability).await? {
                warn!("{} did not hold {}", crsid, capability);
            }
            Ok(())
        }
        Command::PurgeSessions => {
            let removed = purge_expired_sessions(&pool).await?;
            info!("Removed {} expired sessions", removed);
            Ok(())
        }
    }
}

async fn serve(pool: sqlx::SqlitePool, config: &TomlConfig) -> Result<()> {
    let lookup = identity_lookup(config)?;
    spawn_session_purge(pool.clone(), SESSION_PURGE_INTERVAL);
    let state = AppState::new(pool, lookup, UiSettings::from_config(config));
    let app = build_router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("ump-ui listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
