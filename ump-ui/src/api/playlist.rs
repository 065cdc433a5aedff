//! Playlist page, feed and player configuration
//!
//! All three surfaces list the same ordered viewable items; the feed further
//! keeps only items the viewer can download that came from the legacy SMS.

use axum::{
    extract::{Path, State},
    response::{Html, Response},
    routing::get,
    Extension, Json, Router,
};
use serde_json::Value;
use tracing::debug;
use ump_common::catalogue::{get_playlist, ordered_viewable_items, Playlist};
use ump_common::visibility::is_feed_eligible;
use ump_common::{is_downloadable_by, is_visible_to, Principal, Viewer};

use super::{delivery_video, rss_response};
use crate::render::feed::{rss, FeedEntry};
use crate::render::pages::playlist_page;
use crate::render::player::{player_config, player_entry};
use crate::{ApiError, ApiResult, AppState};

async fn visible_playlist(state: &AppState, id: &str, viewer: &Viewer) -> ApiResult<Playlist> {
    let playlist = get_playlist(&state.db, id).await?;
    if !is_visible_to(&playlist, viewer) {
        debug!(playlist_id = %id, "Playlist hidden from viewer");
        return Err(ApiError::NotFound(format!("playlist {}", id)));
    }
    Ok(playlist)
}

async fn render_playlist_page(
    state: &AppState,
    id: &str,
    principal: Principal,
    edit: bool,
) -> ApiResult<Html<String>> {
    let viewer = state.viewer(principal).await;
    let playlist = visible_playlist(state, id, &viewer).await?;
    let items = ordered_viewable_items(&state.db, &playlist, &viewer).await?;

    Ok(Html(playlist_page(
        &playlist,
        &items,
        &viewer,
        edit,
        state.settings.gtag_id.as_deref(),
    )))
}

/// GET /playlists/:id
pub async fn playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Html<String>> {
    render_playlist_page(&state, &id, principal, false).await
}

/// GET /playlists/:id/edit
pub async fn playlist_edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Html<String>> {
    render_playlist_page(&state, &id, principal, true).await
}

/// GET /playlists/:id/rss
pub async fn playlist_rss(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Response> {
    let viewer = state.viewer(principal).await;
    let playlist = visible_playlist(&state, &id, &viewer).await?;

    if !is_feed_eligible(&playlist) {
        debug!(playlist_id = %id, "Playlist has no legacy collection, no feed");
        return Err(ApiError::NotFound(format!("playlist {}", id)));
    }

    let items = ordered_viewable_items(&state.db, &playlist, &viewer).await?;
    let mut entries = Vec::new();
    for item in items
        .iter()
        .filter(|item| is_downloadable_by(*item, &viewer) && is_feed_eligible(*item))
    {
        let video = delivery_video(&state, item).await;
        entries.push(FeedEntry::for_item(item, video.as_ref()));
    }

    let link = format!("/playlists/{}", playlist.id);
    Ok(rss_response(rss(
        &playlist.title,
        &link,
        &playlist.description,
        &entries,
    )))
}

/// GET /playlists/:id/player.json
pub async fn playlist_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    let viewer = state.viewer(principal).await;
    let playlist = visible_playlist(&state, &id, &viewer).await?;
    let items = ordered_viewable_items(&state.db, &playlist, &viewer).await?;

    let mut entries = Vec::with_capacity(items.len());
    for item in &items {
        let video = delivery_video(&state, item).await;
        entries.push(player_entry(item, video.as_ref()));
    }

    Ok(Json(player_config(entries, &state.settings.embed_player_key)))
}

pub fn playlist_routes() -> Router<AppState> {
    Router::new()
        .route("/playlists/:id", get(playlist))
        .route("/playlists/:id/edit", get(playlist_edit))
        .route("/playlists/:id/rss", get(playlist_rss))
        .route("/playlists/:id/player.json", get(playlist_player))
}
