//! Media catalogue: media items, channels and playlists
//!
//! Every entity owns its permission rows. External identifiers never live on
//! catalogue rows; the optional back-references to the legacy SMS and to JWP
//! are read through the bridge tables (see [`crate::sync`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

pub mod channel;
pub mod media_item;
pub mod playlist;

pub use channel::{create_channel, get_channel, Channel, NewChannel};
pub use media_item::{
    create_media_item, delete_media_item, get_media_item, get_media_items,
    list_channel_media_items, set_downloadable, MediaItem, NewMediaItem,
};
pub use playlist::{
    append_media_item, create_playlist, get_playlist, list_channel_playlists, order_viewable,
    ordered_viewable_items, NewPlaylist, Playlist,
};

/// Kind of media a media item holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    #[default]
    Unknown,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "unknown" => Ok(MediaType::Unknown),
            _ => Err(Error::InvalidInput(format!("Invalid media type: {}", s))),
        }
    }
}

/// Back-reference to the legacy SMS record an entity was sourced from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyLink {
    pub sms_id: i64,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Back-reference to the JWP resource an entity is delivered through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwpLink {
    pub key: String,
    pub last_updated_at: Option<DateTime<Utc>>,
}

pub(crate) fn legacy_link_from_row(row: &SqliteRow) -> Result<Option<LegacyLink>> {
    let sms_id: Option<i64> = row.try_get("sms_id")?;
    Ok(match sms_id {
        Some(sms_id) => Some(LegacyLink {
            sms_id,
            last_updated_at: row.try_get("sms_last_updated_at")?,
        }),
        None => None,
    })
}

pub(crate) fn jwp_link_from_row(row: &SqliteRow) -> Result<Option<JwpLink>> {
    let key: Option<String> = row.try_get("jwp_key")?;
    Ok(match key {
        Some(key) => Some(JwpLink {
            key,
            last_updated_at: row.try_get("jwp_last_updated_at")?,
        }),
        None => None,
    })
}

pub(crate) fn decode_string_list(raw: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(raw)?)
}

pub(crate) fn encode_string_list(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}
