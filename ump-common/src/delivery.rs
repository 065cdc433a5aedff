//! JWP delivery data
//!
//! Playable sources come from delivery records cached locally in
//! `jwp_cached_resources`. This module parses those records, builds the
//! player and thumbnail URLs, and reads/writes the cache.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::catalogue::MediaItem;
use crate::{Error, Result};

const PLAYER_BASE: &str = "https://content.jwplatform.com";
const THUMBNAIL_BASE: &str = "https://cdn.jwplayer.com/thumbs";

/// One encoded rendition of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySource {
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub file: String,
}

impl DeliverySource {
    fn is_preferred_download(&self) -> bool {
        self.mime_type == "video/mp4" || self.mime_type.starts_with("audio/")
    }
}

/// A video as described by the delivery API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryVideo {
    #[serde(alias = "mediaid")]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Publication time, seconds since the epoch
    #[serde(default, alias = "pubdate")]
    pub date: Option<i64>,
    #[serde(default)]
    pub duration: f64,
    /// Legacy SMS access control string, carried through untouched
    #[serde(default)]
    pub sms_acl: Option<String>,
    #[serde(default)]
    pub sms_media_id: Option<String>,
    #[serde(default)]
    pub sources: Vec<DeliverySource>,
}

impl DeliveryVideo {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.date
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn legacy_media_id(&self) -> Option<i64> {
        self.sms_media_id.as_deref().and_then(parse_sms_media_id)
    }

    /// The source used as a download or feed enclosure
    ///
    /// Widest MP4 or audio rendition; falls back to the widest source of any
    /// type.
    pub fn best_download_source(&self) -> Option<&DeliverySource> {
        fn widest<'a>(candidates: Vec<&'a DeliverySource>) -> Option<&'a DeliverySource> {
            candidates
                .into_iter()
                .max_by_key(|source| source.width.unwrap_or(0))
        }

        let preferred: Vec<&DeliverySource> = self
            .sources
            .iter()
            .filter(|source| source.is_preferred_download())
            .collect();

        widest(preferred).or_else(|| widest(self.sources.iter().collect()))
    }

    pub fn thumbnail_url(&self, width: u32) -> String {
        thumbnail_url(&self.key, width)
    }
}

/// Parse an SMS media reference of the form `media:<id>:`
pub fn parse_sms_media_id(value: &str) -> Option<i64> {
    value
        .strip_prefix("media:")?
        .strip_suffix(':')?
        .parse()
        .ok()
}

/// Embeddable player URL for a video key, e.g. `format = "html"` or `"js"`
pub fn player_embed_url(key: &str, player: &str, format: &str) -> String {
    format!("{}/players/{}-{}.{}", PLAYER_BASE, key, player, format)
}

/// Player library URL, using `player_override` when given
pub fn player_library_url(player_override: Option<&str>, default_player: &str) -> String {
    let player = player_override.unwrap_or(default_player);
    format!("{}/libraries/{}.js", PLAYER_BASE, player)
}

pub fn thumbnail_url(key: &str, width: u32) -> String {
    format!("{}/{}-{}.jpg", THUMBNAIL_BASE, key, width)
}

/// Kind of resource held in the delivery cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Video,
    Channel,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Video => "video",
            ResourceType::Channel => "channel",
        }
    }
}

/// Store or replace a cached delivery resource, clearing any deletion mark
pub async fn cache_resource(
    pool: &SqlitePool,
    key: &str,
    resource_type: ResourceType,
    data: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO jwp_cached_resources (key, type, data, updated_at, deleted_at)
        VALUES (?, ?, ?, ?, NULL)
        ON CONFLICT(key) DO UPDATE SET
            type = excluded.type,
            data = excluded.data,
            updated_at = excluded.updated_at,
            deleted_at = NULL
        "#,
    )
    .bind(key)
    .bind(resource_type.as_str())
    .bind(serde_json::to_string(data)?)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    debug!(key, resource_type = resource_type.as_str(), "Cached delivery resource");
    Ok(())
}

pub async fn cache_video(pool: &SqlitePool, video: &DeliveryVideo) -> Result<()> {
    let data = serde_json::to_value(video)?;
    cache_resource(pool, &video.key, ResourceType::Video, &data).await
}

/// Soft-delete a cached resource; returns whether a live row was marked
pub async fn mark_resource_deleted(pool: &SqlitePool, key: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE jwp_cached_resources SET deleted_at = ? WHERE key = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// A live cached video by key
pub async fn cached_video(pool: &SqlitePool, key: &str) -> Result<Option<DeliveryVideo>> {
    let data: Option<String> = sqlx::query_scalar(
        r#"
        SELECT data FROM jwp_cached_resources
        WHERE key = ? AND type = 'video' AND deleted_at IS NULL
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    match data {
        Some(data) => match serde_json::from_str(&data) {
            Ok(video) => Ok(Some(video)),
            Err(e) => {
                warn!(key, error = %e, "Cached delivery video is malformed");
                Err(Error::Json(e))
            }
        },
        None => Ok(None),
    }
}

/// The cached delivery video behind a media item, if it has one
pub async fn video_for_item(pool: &SqlitePool, item: &MediaItem) -> Result<Option<DeliveryVideo>> {
    match &item.jwp {
        Some(link) => cached_video(pool, &link.key).await,
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> serde_json::Value {
        json!({
            "key": "mock1",
            "title": "Mock 1",
            "description": "Description for mock 1",
            "date": 1234567,
            "duration": 54,
            "sms_acl": "acl:WORLD:",
            "sms_media_id": "media:1234:",
            "sources": [
                {
                    "type": "video/mp4", "width": 1920, "height": 1080,
                    "file": "http://cdn.invalid/vid1.mp4"
                },
                {
                    "type": "video/mp4", "width": 720, "height": 406,
                    "file": "http://cdn.invalid/vid2.mp4"
                }
            ]
        })
    }

    #[test]
    fn test_parse_fixture() {
        let video: DeliveryVideo = serde_json::from_value(fixture()).unwrap();
        assert_eq!(video.key, "mock1");
        assert_eq!(video.duration, 54.0);
        assert_eq!(video.sms_acl.as_deref(), Some("acl:WORLD:"));
        assert_eq!(video.legacy_media_id(), Some(1234));
        assert_eq!(video.sources.len(), 2);
        assert_eq!(
            video.published_at(),
            Utc.timestamp_opt(1234567, 0).single()
        );
    }

    #[test]
    fn test_parse_delivery_api_field_names() {
        let video: DeliveryVideo = serde_json::from_value(json!({
            "mediaid": "abc123",
            "pubdate": 10,
            "sources": []
        }))
        .unwrap();
        assert_eq!(video.key, "abc123");
        assert_eq!(video.date, Some(10));
        assert!(video.sms_media_id.is_none());
    }

    #[test]
    fn test_best_download_source_is_widest_mp4() {
        let video: DeliveryVideo = serde_json::from_value(fixture()).unwrap();
        let best = video.best_download_source().unwrap();
        assert_eq!(best.file, "http://cdn.invalid/vid1.mp4");
    }

    #[test]
    fn test_best_download_source_prefers_mp4_over_wider_stream() {
        let video: DeliveryVideo = serde_json::from_value(json!({
            "key": "k",
            "sources": [
                {"type": "application/vnd.apple.mpegurl", "file": "http://cdn.invalid/m.m3u8"},
                {"type": "video/webm", "width": 3840, "file": "http://cdn.invalid/big.webm"},
                {"type": "audio/mp4", "file": "http://cdn.invalid/a.m4a"}
            ]
        }))
        .unwrap();
        assert_eq!(
            video.best_download_source().unwrap().file,
            "http://cdn.invalid/a.m4a"
        );
    }

    #[test]
    fn test_best_download_source_falls_back_and_handles_empty() {
        let video: DeliveryVideo = serde_json::from_value(json!({
            "key": "k",
            "sources": [
                {"type": "video/webm", "width": 640, "file": "http://cdn.invalid/small.webm"},
                {"type": "video/webm", "width": 1280, "file": "http://cdn.invalid/big.webm"}
            ]
        }))
        .unwrap();
        assert_eq!(
            video.best_download_source().unwrap().file,
            "http://cdn.invalid/big.webm"
        );

        let empty: DeliveryVideo = serde_json::from_value(json!({"key": "k"})).unwrap();
        assert!(empty.best_download_source().is_none());
    }

    #[test]
    fn test_parse_sms_media_id() {
        assert_eq!(parse_sms_media_id("media:1234:"), Some(1234));
        assert_eq!(parse_sms_media_id("media:1234"), None);
        assert_eq!(parse_sms_media_id("collection:1234:"), None);
        assert_eq!(parse_sms_media_id("media:abc:"), None);
    }

    #[test]
    fn test_player_library_url() {
        let url = player_library_url(None, "So5taiQuig");
        assert!(url.contains("So5taiQuig"));

        let url = player_library_url(Some("IeShaeWie1"), "quuMaek2no");
        assert!(url.contains("IeShaeWie1"));
        assert!(!url.contains("quuMaek2no"));
    }

    #[test]
    fn test_embed_and_thumbnail_urls() {
        assert_eq!(
            player_embed_url("mock1", "So5taiQuig", "html"),
            "https://content.jwplatform.com/players/mock1-So5taiQuig.html"
        );
        assert_eq!(
            thumbnail_url("mock1", 640),
            "https://cdn.jwplayer.com/thumbs/mock1-640.jpg"
        );
    }
}
