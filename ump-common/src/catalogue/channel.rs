//! Channel repository

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{jwp_link_from_row, JwpLink};
use crate::permission::{insert_permission, permission_from_row, Permission};
use crate::principal::ResourceKind;
use crate::token::make_token;
use crate::visibility::Protected;
use crate::{Error, Result};

const CHANNEL_SELECT: &str = r#"
    SELECT c.id, c.title, c.description, c.created_at, c.updated_at,
           vp.id AS vp_id, vp.is_public AS vp_is_public, vp.crsids AS vp_crsids,
           vp.group_ids AS vp_group_ids, vp.inst_ids AS vp_inst_ids,
           ep.id AS ep_id, ep.is_public AS ep_is_public, ep.crsids AS ep_crsids,
           ep.group_ids AS ep_group_ids, ep.inst_ids AS ep_inst_ids,
           j.key AS jwp_key, j.last_updated_at AS jwp_last_updated_at
    FROM channels c
    JOIN permissions vp ON vp.id = c.view_permission_id
    JOIN permissions ep ON ep.id = c.edit_permission_id
    LEFT JOIN jwp_channels j ON j.channel_id = c.id
    WHERE c.deleted_at IS NULL
"#;

/// A channel groups media items and playlists under one set of editors
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: String,
    pub title: String,
    pub description: String,
    pub view_permission: Permission,
    pub edit_permission: Permission,
    pub jwp: Option<JwpLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Protected for Channel {
    const KIND: ResourceKind = ResourceKind::Channel;

    fn view_permission(&self) -> &Permission {
        &self.view_permission
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewChannel {
    pub title: String,
    pub description: String,
}

fn channel_from_row(row: &SqliteRow) -> Result<Channel> {
    Ok(Channel {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        view_permission: permission_from_row(row, "vp_")?,
        edit_permission: permission_from_row(row, "ep_")?,
        jwp: jwp_link_from_row(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Create a channel with its view and edit permissions in one transaction
pub async fn create_channel(
    pool: &SqlitePool,
    new: &NewChannel,
    view_permission: Permission,
    edit_permission: Permission,
) -> Result<Channel> {
    if view_permission.id == edit_permission.id {
        return Err(Error::InvalidInput(
            "view and edit permissions must be distinct rows".to_string(),
        ));
    }

    let id = make_token();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    insert_permission(&mut *tx, &view_permission).await?;
    insert_permission(&mut *tx, &edit_permission).await?;

    sqlx::query(
        r#"
        INSERT INTO channels (
            id, title, description, view_permission_id, edit_permission_id,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&view_permission.id)
    .bind(&edit_permission.id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(channel_id = %id, "Created channel");

    get_channel(pool, &id).await
}

/// Fetch a live channel
pub async fn get_channel(pool: &SqlitePool, id: &str) -> Result<Channel> {
    let sql = format!("{} AND c.id = ?", CHANNEL_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("channel {}", id)))?;

    channel_from_row(&row)
}
