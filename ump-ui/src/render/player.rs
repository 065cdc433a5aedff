//! Player configuration JSON
//!
//! One entry per media item, shaped for the JW Player `playlist` option.

use serde_json::{json, Value};
use ump_common::catalogue::MediaItem;
use ump_common::delivery::{player_library_url, DeliveryVideo};

/// Thumbnail width used for player poster images
const POSTER_WIDTH: u32 = 720;

/// Player playlist entry for a media item
///
/// Items without a cached delivery video get an empty source list.
pub fn player_entry(item: &MediaItem, video: Option<&DeliveryVideo>) -> Value {
    let sources: Vec<Value> = video
        .map(|video| {
            video
                .sources
                .iter()
                .map(|source| {
                    json!({
                        "file": source.file,
                        "type": source.mime_type,
                        "width": source.width,
                        "height": source.height,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "mediaid": item.id,
        "title": item.title,
        "description": item.description,
        "duration": item.duration,
        "image": video.map(|video| video.thumbnail_url(POSTER_WIDTH)),
        "link": format!("/media/{}", item.id),
        "sources": sources,
    })
}

/// Full player configuration
pub fn player_config(entries: Vec<Value>, default_player: &str) -> Value {
    json!({
        "library": player_library_url(None, default_player),
        "playlist": entries,
    })
}
