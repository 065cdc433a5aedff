//! ump-ui library - University Media Platform web front end
//!
//! Server-rendered pages, RSS feeds and player configuration for media
//! items, channels and playlists. Every resource is filtered through the
//! visibility resolver for the requesting viewer before it is rendered.

use axum::{middleware, Router};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use ump_common::config::TomlConfig;
use ump_common::lookup::IdentityLookup;
use ump_common::{Principal, Viewer};

pub mod api;
pub mod error;
pub mod render;

pub use api::{spawn_session_purge, SESSION_COOKIE};
pub use error::{ApiError, ApiResult};

/// Settings the handlers need, taken from the bootstrap configuration
#[derive(Debug, Clone)]
pub struct UiSettings {
    pub login_url: String,
    pub gtag_id: Option<String>,
    pub embed_player_key: String,
    pub lookup_timeout: Duration,
}

impl UiSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            login_url: config.login_url().to_string(),
            gtag_id: config.gtag().map(str::to_string),
            embed_player_key: config.jwplatform.embed_player_key.clone(),
            lookup_timeout: config.lookup.timeout(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Group and institution lookup for viewers
    pub lookup: Arc<dyn IdentityLookup>,
    pub settings: Arc<UiSettings>,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(db: SqlitePool, lookup: Arc<dyn IdentityLookup>, settings: UiSettings) -> Self {
        Self {
            db,
            lookup,
            settings: Arc::new(settings),
            startup_time: Instant::now(),
        }
    }

    /// Resolve the viewer for a request principal
    ///
    /// Lookup failures degrade to no memberships.
    pub async fn viewer(&self, principal: Principal) -> Viewer {
        Viewer::resolve(principal, self.lookup.as_ref(), self.settings.lookup_timeout).await
    }
}

/// Build application router
///
/// Every route sees the request principal; the session middleware resolves
/// it from the session cookie and falls back to anonymous.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::page_routes())
        .merge(api::media_routes())
        .merge(api::channel_routes())
        .merge(api::playlist_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
