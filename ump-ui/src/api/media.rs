//! Media item page, feed and player configuration

use axum::{
    extract::{Path, State},
    response::{Html, Response},
    routing::get,
    Extension, Json, Router,
};
use serde_json::Value;
use tracing::debug;
use ump_common::catalogue::{get_channel, get_media_item, MediaItem};
use ump_common::visibility::{can_edit_channel, is_feed_eligible};
use ump_common::{is_downloadable_by, is_visible_to, Error, Principal, Viewer};

use super::{delivery_video, rss_response};
use crate::render::feed::{rss, FeedEntry};
use crate::render::pages::{media_page, MediaPage};
use crate::render::player::{player_config, player_entry};
use crate::{ApiError, ApiResult, AppState};

/// Fetch an item the viewer may see; hidden items are reported as missing
async fn visible_item(state: &AppState, id: &str, viewer: &Viewer) -> ApiResult<MediaItem> {
    let item = get_media_item(&state.db, id).await?;
    if !is_visible_to(&item, viewer) {
        debug!(item_id = %id, "Media item hidden from viewer");
        return Err(ApiError::NotFound(format!("media item {}", id)));
    }
    Ok(item)
}

/// Can the viewer edit the channel owning this item?
async fn can_edit_item(state: &AppState, item: &MediaItem, viewer: &Viewer) -> ApiResult<bool> {
    let Some(channel_id) = &item.channel_id else {
        return Ok(false);
    };

    match get_channel(&state.db, channel_id).await {
        Ok(channel) => Ok(can_edit_channel(&channel, viewer)),
        Err(Error::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn render_media_page(
    state: &AppState,
    id: &str,
    principal: Principal,
    edit: bool,
) -> ApiResult<Html<String>> {
    let viewer = state.viewer(principal).await;
    let item = visible_item(state, id, &viewer).await?;
    let video = delivery_video(state, &item).await;
    let can_edit = can_edit_item(state, &item, &viewer).await?;

    let page = MediaPage {
        item: &item,
        video: video.as_ref(),
        viewer: &viewer,
        can_edit,
        edit,
        embed_player_key: &state.settings.embed_player_key,
    };

    Ok(Html(media_page(&page, state.settings.gtag_id.as_deref())))
}

/// GET /media/:id
pub async fn media_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Html<String>> {
    render_media_page(&state, &id, principal, false).await
}

/// GET /media/:id/edit
pub async fn media_item_edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Html<String>> {
    render_media_page(&state, &id, principal, true).await
}

/// GET /media/:id/rss
///
/// Only items the viewer may download and that came from the legacy SMS
/// have a feed.
pub async fn media_item_rss(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Response> {
    let viewer = state.viewer(principal).await;
    let item = get_media_item(&state.db, &id).await?;

    if !is_downloadable_by(&item, &viewer) || !is_feed_eligible(&item) {
        debug!(item_id = %id, "Media item feed unavailable to viewer");
        return Err(ApiError::NotFound(format!("media item {}", id)));
    }

    let video = delivery_video(&state, &item).await;
    let entry = FeedEntry::for_item(&item, video.as_ref());
    let link = format!("/media/{}", item.id);

    Ok(rss_response(rss(&item.title, &link, &item.description, &[entry])))
}

/// GET /media/:id/player.json
pub async fn media_item_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    let viewer = state.viewer(principal).await;
    let item = visible_item(&state, &id, &viewer).await?;
    let video = delivery_video(&state, &item).await;

    let entries = vec![player_entry(&item, video.as_ref())];
    Ok(Json(player_config(entries, &state.settings.embed_player_key)))
}

/// Build media item routes
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/media/:id", get(media_item))
        .route("/media/:id/edit", get(media_item_edit))
        .route("/media/:id/rss", get(media_item_rss))
        .route("/media/:id/player.json", get(media_item_player))
}
