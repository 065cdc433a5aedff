//! Media item repository

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use super::{
    decode_string_list, encode_string_list, jwp_link_from_row, legacy_link_from_row, JwpLink,
    LegacyLink, MediaType,
};
use crate::permission::{insert_permission, permission_from_row, Permission};
use crate::principal::ResourceKind;
use crate::token::make_token;
use crate::visibility::Protected;
use crate::{Error, Result};

const MEDIA_ITEM_SELECT: &str = r#"
    SELECT m.id, m.title, m.description, m.type AS media_type, m.duration,
           m.published_at, m.downloadable, m.language, m.copyright, m.tags,
           m.channel_id, m.created_at, m.updated_at,
           p.id AS vp_id, p.is_public AS vp_is_public, p.crsids AS vp_crsids,
           p.group_ids AS vp_group_ids, p.inst_ids AS vp_inst_ids,
           s.id AS sms_id, s.last_updated_at AS sms_last_updated_at,
           j.key AS jwp_key, j.last_updated_at AS jwp_last_updated_at
    FROM media_items m
    JOIN permissions p ON p.id = m.view_permission_id
    LEFT JOIN legacysms_media_items s ON s.item_id = m.id
    LEFT JOIN jwp_videos j ON j.item_id = m.id
    WHERE m.deleted_at IS NULL
"#;

/// A media item as stored in the catalogue
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub media_type: MediaType,
    /// Duration in seconds
    pub duration: f64,
    pub published_at: Option<DateTime<Utc>>,
    pub downloadable: bool,
    pub language: String,
    pub copyright: String,
    pub tags: Vec<String>,
    pub channel_id: Option<String>,
    pub view_permission: Permission,
    pub sms: Option<LegacyLink>,
    pub jwp: Option<JwpLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Protected for MediaItem {
    const KIND: ResourceKind = ResourceKind::MediaItem;

    fn view_permission(&self) -> &Permission {
        &self.view_permission
    }

    fn downloadable(&self) -> bool {
        self.downloadable
    }

    fn has_legacy_link(&self) -> bool {
        self.sms.is_some()
    }
}

/// Fields for a media item about to be created
#[derive(Debug, Clone, Default)]
pub struct NewMediaItem {
    pub title: String,
    pub description: String,
    pub media_type: MediaType,
    pub duration: f64,
    pub published_at: Option<DateTime<Utc>>,
    pub downloadable: bool,
    pub language: String,
    pub copyright: String,
    pub tags: Vec<String>,
    pub channel_id: Option<String>,
}

impl NewMediaItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

fn media_item_from_row(row: &SqliteRow) -> Result<MediaItem> {
    let media_type: String = row.try_get("media_type")?;
    let tags: String = row.try_get("tags")?;

    Ok(MediaItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        media_type: media_type.parse()?,
        duration: row.try_get("duration")?,
        published_at: row.try_get("published_at")?,
        downloadable: row.try_get("downloadable")?,
        language: row.try_get("language")?,
        copyright: row.try_get("copyright")?,
        tags: decode_string_list(&tags)?,
        channel_id: row.try_get("channel_id")?,
        view_permission: permission_from_row(row, "vp_")?,
        sms: legacy_link_from_row(row)?,
        jwp: jwp_link_from_row(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Create a media item together with its view permission
///
/// Both rows are written in one transaction.
pub async fn create_media_item(
    pool: &SqlitePool,
    new: &NewMediaItem,
    view_permission: Permission,
) -> Result<MediaItem> {
    let id = make_token();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    insert_permission(&mut *tx, &view_permission).await?;

    sqlx::query(
        r#"
        INSERT INTO media_items (
            id, title, description, type, duration, published_at, downloadable,
            language, copyright, tags, channel_id, view_permission_id,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.media_type.as_str())
    .bind(new.duration)
    .bind(new.published_at)
    .bind(new.downloadable)
    .bind(&new.language)
    .bind(&new.copyright)
    .bind(encode_string_list(&new.tags)?)
    .bind(&new.channel_id)
    .bind(&view_permission.id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(item_id = %id, "Created media item");

    get_media_item(pool, &id).await
}

/// Fetch a live (non-deleted) media item
pub async fn get_media_item(pool: &SqlitePool, id: &str) -> Result<MediaItem> {
    let sql = format!("{} AND m.id = ?", MEDIA_ITEM_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("media item {}", id)))?;

    media_item_from_row(&row)
}

/// Fetch many live media items by id in one query
///
/// Ids without a live row are absent from the result.
pub async fn get_media_items(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<HashMap<String, MediaItem>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(MEDIA_ITEM_SELECT);
    query.push(" AND m.id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows = query.build().fetch_all(pool).await?;

    rows.iter()
        .map(|row| media_item_from_row(row).map(|item| (item.id.clone(), item)))
        .collect()
}

/// Live media items in a channel, most recently published first
pub async fn list_channel_media_items(
    pool: &SqlitePool,
    channel_id: &str,
) -> Result<Vec<MediaItem>> {
    let sql = format!(
        "{} AND m.channel_id = ? ORDER BY m.published_at DESC, m.created_at DESC",
        MEDIA_ITEM_SELECT
    );
    let rows = sqlx::query(&sql).bind(channel_id).fetch_all(pool).await?;

    rows.iter().map(media_item_from_row).collect()
}

/// Set the downloadable flag
pub async fn set_downloadable(pool: &SqlitePool, id: &str, downloadable: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE media_items SET downloadable = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(downloadable)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("media item {}", id)));
    }
    Ok(())
}

/// Soft-delete a media item
///
/// The row and its bridge records stay; the item disappears from every
/// catalogue query.
pub async fn delete_media_item(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE media_items SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("media item {}", id)));
    }
    info!(item_id = %id, "Deleted media item");
    Ok(())
}
