//! Playlists and ordered media collection resolution
//!
//! A playlist stores an ordered list of media item ids. The list may contain
//! duplicates and ids whose item has since gone away; both are tolerated and
//! dealt with when the playlist is resolved for a viewer.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use super::media_item::{get_media_items, MediaItem};
use super::{decode_string_list, encode_string_list, legacy_link_from_row, LegacyLink};
use crate::permission::{insert_permission, permission_from_row, Permission};
use crate::principal::ResourceKind;
use crate::token::make_token;
use crate::visibility::{is_visible_to, Protected, Viewer};
use crate::{Error, Result};

const PLAYLIST_SELECT: &str = r#"
    SELECT pl.id, pl.title, pl.description, pl.channel_id, pl.media_items,
           pl.created_at, pl.updated_at,
           p.id AS vp_id, p.is_public AS vp_is_public, p.crsids AS vp_crsids,
           p.group_ids AS vp_group_ids, p.inst_ids AS vp_inst_ids,
           s.id AS sms_id, s.last_updated_at AS sms_last_updated_at
    FROM playlists pl
    JOIN permissions p ON p.id = pl.view_permission_id
    LEFT JOIN legacysms_collections s ON s.playlist_id = pl.id
    WHERE pl.deleted_at IS NULL
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_id: Option<String>,
    /// Ordered media item ids, as stored
    pub media_item_ids: Vec<String>,
    pub view_permission: Permission,
    pub sms: Option<LegacyLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Protected for Playlist {
    const KIND: ResourceKind = ResourceKind::Playlist;

    fn view_permission(&self) -> &Permission {
        &self.view_permission
    }

    fn has_legacy_link(&self) -> bool {
        self.sms.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewPlaylist {
    pub title: String,
    pub description: String,
    pub channel_id: Option<String>,
    pub media_item_ids: Vec<String>,
}

fn playlist_from_row(row: &SqliteRow) -> Result<Playlist> {
    let media_items: String = row.try_get("media_items")?;

    Ok(Playlist {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        channel_id: row.try_get("channel_id")?,
        media_item_ids: decode_string_list(&media_items)?,
        view_permission: permission_from_row(row, "vp_")?,
        sms: legacy_link_from_row(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Create a playlist with its view permission in one transaction
pub async fn create_playlist(
    pool: &SqlitePool,
    new: &NewPlaylist,
    view_permission: Permission,
) -> Result<Playlist> {
    let id = make_token();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    insert_permission(&mut *tx, &view_permission).await?;

    sqlx::query(
        r#"
        INSERT INTO playlists (
            id, title, description, channel_id, media_items, view_permission_id,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.channel_id)
    .bind(encode_string_list(&new.media_item_ids)?)
    .bind(&view_permission.id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(playlist_id = %id, "Created playlist");

    get_playlist(pool, &id).await
}

/// Fetch a live playlist
pub async fn get_playlist(pool: &SqlitePool, id: &str) -> Result<Playlist> {
    let sql = format!("{} AND pl.id = ?", PLAYLIST_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("playlist {}", id)))?;

    playlist_from_row(&row)
}

/// Live playlists in a channel, newest first
pub async fn list_channel_playlists(pool: &SqlitePool, channel_id: &str) -> Result<Vec<Playlist>> {
    let sql = format!("{} AND pl.channel_id = ? ORDER BY pl.created_at DESC", PLAYLIST_SELECT);
    let rows = sqlx::query(&sql).bind(channel_id).fetch_all(pool).await?;

    rows.iter().map(playlist_from_row).collect()
}

/// Append a media item id to the end of a playlist
///
/// The id is stored as given; it is not checked against the catalogue.
pub async fn append_media_item(pool: &SqlitePool, playlist_id: &str, item_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    let raw: Option<String> = sqlx::query_scalar(
        "SELECT media_items FROM playlists WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(playlist_id)
    .fetch_optional(&mut *tx)
    .await?;

    let raw = raw.ok_or_else(|| Error::NotFound(format!("playlist {}", playlist_id)))?;
    let mut ids = decode_string_list(&raw)?;
    ids.push(item_id.to_string());

    sqlx::query("UPDATE playlists SET media_items = ?, updated_at = ? WHERE id = ?")
        .bind(encode_string_list(&ids)?)
        .bind(Utc::now())
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Resolve an id sequence against pre-loaded items for a viewer
///
/// Walks `ids` in order, skips ids missing from `items`, and keeps items the
/// viewer can see. A duplicated id yields the item twice.
pub fn order_viewable(
    ids: &[String],
    items: &HashMap<String, MediaItem>,
    viewer: &Viewer,
) -> Vec<MediaItem> {
    ids.iter()
        .filter_map(|id| items.get(id))
        .filter(|item| is_visible_to(*item, viewer))
        .cloned()
        .collect()
}

/// The playlist's media items visible to the viewer, in stored order
pub async fn ordered_viewable_items(
    pool: &SqlitePool,
    playlist: &Playlist,
    viewer: &Viewer,
) -> Result<Vec<MediaItem>> {
    let items = get_media_items(pool, &playlist.media_item_ids).await?;
    let ordered = order_viewable(&playlist.media_item_ids, &items, viewer);

    debug!(
        playlist_id = %playlist.id,
        stored = playlist.media_item_ids.len(),
        resolved = items.len(),
        visible = ordered.len(),
        "Resolved playlist items"
    );

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::MediaType;
    use crate::lookup::Memberships;
    use crate::principal::Principal;

    fn item(id: &str, permission: Permission) -> MediaItem {
        let now = Utc::now();
        MediaItem {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: String::new(),
            media_type: MediaType::Video,
            duration: 10.0,
            published_at: None,
            downloadable: false,
            language: String::new(),
            copyright: String::new(),
            tags: vec![],
            channel_id: None,
            view_permission: permission,
            sms: None,
            jwp: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn catalogue(items: Vec<MediaItem>) -> HashMap<String, MediaItem> {
        items.into_iter().map(|i| (i.id.clone(), i)).collect()
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn resolved_ids(items: &[MediaItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_hidden_item_dropped_order_kept() {
        let items = catalogue(vec![
            item("a", Permission::public()),
            item("b", Permission::new()),
            item("c", Permission::public()),
        ]);
        let result = order_viewable(&ids(&["a", "b", "c"]), &items, &Viewer::anonymous());
        assert_eq!(resolved_ids(&result), vec!["a", "c"]);
    }

    #[test]
    fn test_stored_order_is_not_resorted() {
        let items = catalogue(vec![
            item("a", Permission::public()),
            item("b", Permission::public()),
            item("c", Permission::public()),
        ]);
        let result = order_viewable(&ids(&["c", "a", "b"]), &items, &Viewer::anonymous());
        assert_eq!(resolved_ids(&result), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dangling_ids_skipped_and_duplicates_kept() {
        let items = catalogue(vec![item("a", Permission::public()), item("b", Permission::public())]);
        let result = order_viewable(
            &ids(&["a", "gone", "b", "a"]),
            &items,
            &Viewer::anonymous(),
        );
        assert_eq!(resolved_ids(&result), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_visibility_depends_on_viewer() {
        let mut only_spqr1 = Permission::new();
        only_spqr1.crsids.insert("spqr1".to_string());
        let items = catalogue(vec![item("a", Permission::public()), item("b", only_spqr1)]);
        let order = ids(&["b", "a"]);

        let anon = order_viewable(&order, &items, &Viewer::anonymous());
        assert_eq!(resolved_ids(&anon), vec!["a"]);

        let owner = Viewer::new(Principal::user("spqr1"), Memberships::default());
        let owned = order_viewable(&order, &items, &owner);
        assert_eq!(resolved_ids(&owned), vec!["b", "a"]);
    }

    #[test]
    fn test_empty_playlist() {
        let result = order_viewable(&[], &HashMap::new(), &Viewer::anonymous());
        assert!(result.is_empty());
    }
}
