//! Database initialization
//!
//! Opens (or creates) the SQLite database and brings the schema up to date:
//! idempotent `CREATE TABLE IF NOT EXISTS` statements first, then versioned
//! migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout applied to every pool
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // foreign_keys and busy_timeout are per-connection pragmas, so they are
    // set on the connect options rather than executed once on the pool
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    // Versioned changes on top of the base schema
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_permissions_table(pool).await?;

    // Catalogue
    create_channels_table(pool).await?;
    create_media_items_table(pool).await?;
    create_playlists_table(pool).await?;

    // Sync bridges
    create_legacysms_tables(pool).await?;
    create_jwp_tables(pool).await?;

    // Principals
    create_users_tables(pool).await?;
    create_sessions_table(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the permissions table
///
/// Identifier sets are JSON arrays of strings.
pub async fn create_permissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS permissions (
            id TEXT PRIMARY KEY,
            is_public INTEGER NOT NULL DEFAULT 0,
            crsids TEXT NOT NULL DEFAULT '[]',
            group_ids TEXT NOT NULL DEFAULT '[]',
            inst_ids TEXT NOT NULL DEFAULT '[]',
            updated_at TIMESTAMP NOT NULL,
            CHECK (json_valid(crsids) AND json_valid(group_ids) AND json_valid(inst_ids))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_channels_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            view_permission_id TEXT NOT NULL UNIQUE REFERENCES permissions(id),
            edit_permission_id TEXT NOT NULL UNIQUE REFERENCES permissions(id),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the media_items table
///
/// `duration` is in seconds. `tags` is a JSON array of strings.
pub async fn create_media_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_items (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            type TEXT NOT NULL DEFAULT 'unknown' CHECK (type IN ('video', 'audio', 'unknown')),
            duration REAL NOT NULL DEFAULT 0 CHECK (duration >= 0),
            published_at TIMESTAMP,
            downloadable INTEGER NOT NULL DEFAULT 0,
            language TEXT NOT NULL DEFAULT '',
            copyright TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            channel_id TEXT REFERENCES channels(id) ON DELETE SET NULL,
            view_permission_id TEXT NOT NULL UNIQUE REFERENCES permissions(id),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the playlists table
///
/// `media_items` is the ordered JSON array of media item ids; stale ids are
/// allowed and filtered out when the playlist is resolved.
pub async fn create_playlists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            channel_id TEXT REFERENCES channels(id) ON DELETE SET NULL,
            media_items TEXT NOT NULL DEFAULT '[]',
            view_permission_id TEXT NOT NULL UNIQUE REFERENCES permissions(id),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the legacy SMS bridge tables
///
/// Deleting the local entity only clears the link (ON DELETE SET NULL).
pub async fn create_legacysms_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legacysms_media_items (
            id INTEGER PRIMARY KEY,
            item_id TEXT UNIQUE REFERENCES media_items(id) ON DELETE SET NULL,
            last_updated_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legacysms_collections (
            id INTEGER PRIMARY KEY,
            playlist_id TEXT UNIQUE REFERENCES playlists(id) ON DELETE SET NULL,
            last_updated_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the JWP bridge tables and the cached resource table
pub async fn create_jwp_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jwp_cached_resources (
            key TEXT PRIMARY KEY,
            type TEXT NOT NULL CHECK (type IN ('video', 'channel')),
            data TEXT NOT NULL DEFAULT '{}',
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP,
            CHECK (json_valid(data))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jwp_videos (
            key TEXT PRIMARY KEY,
            item_id TEXT UNIQUE REFERENCES media_items(id) ON DELETE SET NULL,
            last_updated_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jwp_channels (
            key TEXT PRIMARY KEY,
            channel_id TEXT UNIQUE REFERENCES channels(id) ON DELETE SET NULL,
            last_updated_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create users and their super capabilities
pub async fn create_users_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            crsid TEXT PRIMARY KEY,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_capabilities (
            crsid TEXT NOT NULL REFERENCES users(crsid) ON DELETE CASCADE,
            capability TEXT NOT NULL,
            PRIMARY KEY (crsid, capability)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the sessions table
///
/// Only the SHA-256 digest of a session token is stored.
pub async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            crsid TEXT NOT NULL REFERENCES users(crsid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL,
            expires_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
