//! HTTP handlers for ump-ui

pub mod auth;
pub mod channel;
pub mod health;
pub mod media;
pub mod pages;
pub mod playlist;

pub use auth::{session_middleware, spawn_session_purge, SESSION_COOKIE};
pub use channel::channel_routes;
pub use health::health_routes;
pub use media::media_routes;
pub use pages::page_routes;
pub use playlist::playlist_routes;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::warn;
use ump_common::catalogue::MediaItem;
use ump_common::delivery::{video_for_item, DeliveryVideo};

use crate::AppState;

/// Cached delivery video for an item; cache problems are logged, not fatal
async fn delivery_video(state: &AppState, item: &MediaItem) -> Option<DeliveryVideo> {
    match video_for_item(&state.db, item).await {
        Ok(video) => video,
        Err(e) => {
            warn!(item_id = %item.id, "Delivery data unavailable: {}", e);
            None
        }
    }
}

fn rss_response(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        body,
    )
        .into_response()
}
