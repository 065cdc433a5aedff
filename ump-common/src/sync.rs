//! Synchronization bridges
//!
//! A bridge maps a record id in an external system (the legacy SMS or the JWP
//! delivery provider) to an optional local catalogue entity. All four bridges
//! share one implementation parameterised by a [`Bridge`] descriptor.
//!
//! Bridge rows are never stored on catalogue rows. Unlinking or removing a
//! bridge record leaves the catalogue entity in place; only its
//! back-reference disappears.

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use std::fmt;
use tracing::{debug, info};

use crate::{Error, Result};

/// Which external system a bridge keys on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalKind {
    /// Integer ids from the legacy SMS
    Sms,
    /// String keys from the JWP delivery provider
    Jwp,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalId {
    Sms(i64),
    Jwp(String),
}

impl ExternalId {
    pub fn kind(&self) -> ExternalKind {
        match self {
            ExternalId::Sms(_) => ExternalKind::Sms,
            ExternalId::Jwp(_) => ExternalKind::Jwp,
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::Sms(id) => write!(f, "sms:{}", id),
            ExternalId::Jwp(key) => write!(f, "jwp:{}", key),
        }
    }
}

/// Table layout of one bridge
#[derive(Debug, Clone, Copy)]
pub struct Bridge {
    pub name: &'static str,
    pub kind: ExternalKind,
    table: &'static str,
    key_column: &'static str,
    local_column: &'static str,
}

/// SMS media id -> media item
pub const SMS_MEDIA_ITEMS: Bridge = Bridge {
    name: "sms_media_items",
    kind: ExternalKind::Sms,
    table: "legacysms_media_items",
    key_column: "id",
    local_column: "item_id",
};

/// SMS collection id -> playlist
pub const SMS_COLLECTIONS: Bridge = Bridge {
    name: "sms_collections",
    kind: ExternalKind::Sms,
    table: "legacysms_collections",
    key_column: "id",
    local_column: "playlist_id",
};

/// JWP video key -> media item
pub const JWP_VIDEOS: Bridge = Bridge {
    name: "jwp_videos",
    kind: ExternalKind::Jwp,
    table: "jwp_videos",
    key_column: "key",
    local_column: "item_id",
};

/// JWP channel key -> channel
pub const JWP_CHANNELS: Bridge = Bridge {
    name: "jwp_channels",
    kind: ExternalKind::Jwp,
    table: "jwp_channels",
    key_column: "key",
    local_column: "channel_id",
};

/// One row of a bridge table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRecord {
    pub external_id: ExternalId,
    pub local_id: Option<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Refreshed,
    Unchanged,
}

/// Whether an incoming stamp should overwrite an existing record
///
/// A missing stamp on either side always counts as stale.
pub fn needs_update(existing: &BridgeRecord, incoming: Option<DateTime<Utc>>) -> bool {
    match (existing.last_updated_at, incoming) {
        (Some(stored), Some(incoming)) => stored != incoming,
        _ => true,
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_external<'q>(query: SqliteQuery<'q>, id: &'q ExternalId) -> SqliteQuery<'q> {
    match id {
        ExternalId::Sms(value) => query.bind(*value),
        ExternalId::Jwp(key) => query.bind(key.as_str()),
    }
}

impl Bridge {
    fn check_kind(&self, id: &ExternalId) -> Result<()> {
        if id.kind() != self.kind {
            return Err(Error::InvalidInput(format!(
                "{} is not a valid key for bridge {}",
                id, self.name
            )));
        }
        Ok(())
    }

    fn select_sql(&self, column: &str) -> String {
        format!(
            "SELECT {key} AS external_key, {local} AS local_id, last_updated_at FROM {table} WHERE {column} = ?",
            key = self.key_column,
            local = self.local_column,
            table = self.table,
            column = column,
        )
    }

    fn record_from_row(&self, row: &SqliteRow) -> Result<BridgeRecord> {
        let external_id = match self.kind {
            ExternalKind::Sms => ExternalId::Sms(row.try_get("external_key")?),
            ExternalKind::Jwp => ExternalId::Jwp(row.try_get("external_key")?),
        };

        Ok(BridgeRecord {
            external_id,
            local_id: row.try_get("local_id")?,
            last_updated_at: row.try_get("last_updated_at")?,
        })
    }

    async fn fetch(
        &self,
        conn: &mut SqliteConnection,
        id: &ExternalId,
    ) -> Result<Option<BridgeRecord>> {
        let sql = self.select_sql(self.key_column);
        let row = bind_external(sqlx::query(&sql), id)
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(|row| self.record_from_row(row)).transpose()
    }

    /// Clear `local_id` from every record of this bridge except `keep`
    async fn detach(
        &self,
        conn: &mut SqliteConnection,
        local_id: &str,
        keep: &ExternalId,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {table} SET {local} = NULL WHERE {local} = ? AND {key} != ?",
            table = self.table,
            local = self.local_column,
            key = self.key_column,
        );
        let result = bind_external(sqlx::query(&sql).bind(local_id), keep)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() > 0 {
            debug!(bridge = self.name, local_id, "Detached local entity from previous record");
        }
        Ok(())
    }

    /// Fetch the record for an external id
    pub async fn get(&self, pool: &SqlitePool, id: &ExternalId) -> Result<Option<BridgeRecord>> {
        self.check_kind(id)?;
        let mut conn = pool.acquire().await?;
        self.fetch(&mut *conn, id).await
    }

    /// Fetch the record currently linked to a local entity
    pub async fn find_by_local(
        &self,
        pool: &SqlitePool,
        local_id: &str,
    ) -> Result<Option<BridgeRecord>> {
        let sql = self.select_sql(self.local_column);
        let row = sqlx::query(&sql)
            .bind(local_id)
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(|row| self.record_from_row(row)).transpose()
    }

    /// Create or refresh the record for an external id
    ///
    /// An existing record with the same non-null stamp is left alone. Otherwise
    /// the link and stamp are overwritten. Linking a local entity detaches it
    /// from any other record of this bridge.
    pub async fn upsert(
        &self,
        pool: &SqlitePool,
        id: &ExternalId,
        last_updated_at: Option<DateTime<Utc>>,
        local_id: Option<&str>,
    ) -> Result<UpsertOutcome> {
        self.check_kind(id)?;
        let mut tx = pool.begin().await?;

        let existing = self.fetch(&mut *tx, id).await?;
        if let Some(existing) = &existing {
            if !needs_update(existing, last_updated_at) {
                debug!(bridge = self.name, external_id = %id, "Bridge record unchanged");
                return Ok(UpsertOutcome::Unchanged);
            }
        }

        if let Some(local_id) = local_id {
            self.detach(&mut *tx, local_id, id).await?;
        }

        let outcome = if existing.is_some() {
            let sql = format!(
                "UPDATE {table} SET {local} = ?, last_updated_at = ? WHERE {key} = ?",
                table = self.table,
                local = self.local_column,
                key = self.key_column,
            );
            bind_external(sqlx::query(&sql).bind(local_id).bind(last_updated_at), id)
                .execute(&mut *tx)
                .await?;
            UpsertOutcome::Refreshed
        } else {
            let sql = format!(
                "INSERT INTO {table} ({key}, {local}, last_updated_at) VALUES (?, ?, ?)",
                table = self.table,
                local = self.local_column,
                key = self.key_column,
            );
            bind_external(sqlx::query(&sql), id)
                .bind(local_id)
                .bind(last_updated_at)
                .execute(&mut *tx)
                .await?;
            UpsertOutcome::Created
        };

        tx.commit().await?;
        info!(
            bridge = self.name,
            external_id = %id,
            local_id = local_id.unwrap_or("-"),
            outcome = ?outcome,
            "Synchronized bridge record"
        );

        Ok(outcome)
    }

    /// Clear the local link of a record, keeping the record
    pub async fn unlink(&self, pool: &SqlitePool, id: &ExternalId) -> Result<()> {
        self.check_kind(id)?;
        let sql = format!(
            "UPDATE {table} SET {local} = NULL WHERE {key} = ?",
            table = self.table,
            local = self.local_column,
            key = self.key_column,
        );
        let result = bind_external(sqlx::query(&sql), id).execute(pool).await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} record {}", self.name, id)));
        }
        info!(bridge = self.name, external_id = %id, "Unlinked bridge record");
        Ok(())
    }

    /// Delete a record
    ///
    /// Returns whether a record existed.
    pub async fn remove(&self, pool: &SqlitePool, id: &ExternalId) -> Result<bool> {
        self.check_kind(id)?;
        let sql = format!(
            "DELETE FROM {table} WHERE {key} = ?",
            table = self.table,
            key = self.key_column,
        );
        let result = bind_external(sqlx::query(&sql), id).execute(pool).await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(bridge = self.name, external_id = %id, "Removed bridge record");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(stamp: Option<DateTime<Utc>>) -> BridgeRecord {
        BridgeRecord {
            external_id: ExternalId::Sms(1),
            local_id: None,
            last_updated_at: stamp,
        }
    }

    #[test]
    fn test_needs_update_rules() {
        let t1 = Utc.with_ymd_and_hms(2018, 3, 1, 12, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2018, 3, 2, 12, 0, 0).unwrap();

        assert!(!needs_update(&record(Some(t1)), Some(t1)));
        assert!(needs_update(&record(Some(t1)), Some(t2)));
        assert!(needs_update(&record(Some(t1)), None));
        assert!(needs_update(&record(None), Some(t1)));
        assert!(needs_update(&record(None), None));
    }

    #[test]
    fn test_external_id_display() {
        assert_eq!(ExternalId::Sms(1234).to_string(), "sms:1234");
        assert_eq!(ExternalId::Jwp("abc".into()).to_string(), "jwp:abc");
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        assert!(SMS_MEDIA_ITEMS.check_kind(&ExternalId::Sms(1)).is_ok());
        assert!(SMS_MEDIA_ITEMS
            .check_kind(&ExternalId::Jwp("abc".into()))
            .is_err());
        assert!(JWP_CHANNELS.check_kind(&ExternalId::Sms(1)).is_err());
    }
}
