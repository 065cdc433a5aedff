//! Channel page

use axum::{
    extract::{Path, State},
    response::Html,
    routing::get,
    Extension, Router,
};
use tracing::debug;
use ump_common::catalogue::{get_channel, list_channel_media_items, list_channel_playlists};
use ump_common::visibility::filter_viewable;
use ump_common::{is_visible_to, Principal};

use crate::render::pages::channel_page;
use crate::{ApiError, ApiResult, AppState};

/// GET /channels/:id
///
/// Lists only the items and playlists the viewer can see.
pub async fn channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Html<String>> {
    let viewer = state.viewer(principal).await;
    let channel = get_channel(&state.db, &id).await?;

    if !is_visible_to(&channel, &viewer) {
        debug!(channel_id = %id, "Channel hidden from viewer");
        return Err(ApiError::NotFound(format!("channel {}", id)));
    }

    let items = filter_viewable(list_channel_media_items(&state.db, &id).await?, &viewer);
    let playlists = filter_viewable(list_channel_playlists(&state.db, &id).await?, &viewer);

    Ok(Html(channel_page(
        &channel,
        &items,
        &playlists,
        &viewer,
        state.settings.gtag_id.as_deref(),
    )))
}

pub fn channel_routes() -> Router<AppState> {
    Router::new().route("/channels/:id", get(channel))
}
