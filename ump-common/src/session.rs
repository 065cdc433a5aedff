//! Users, super capabilities and login sessions
//!
//! Authentication itself happens elsewhere; this module only records which
//! crsid a session token belongs to. Session tokens are returned once on
//! creation and stored as SHA-256 hex digests.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::principal::{Capability, Principal};
use crate::token::make_secret;
use crate::{Error, Result};

/// SHA-256 hex digest of a session token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Record a user if not already known
pub async fn ensure_user(pool: &SqlitePool, crsid: &str) -> Result<()> {
    if crsid.trim().is_empty() {
        return Err(Error::InvalidInput("crsid must not be empty".to_string()));
    }

    sqlx::query("INSERT OR IGNORE INTO users (crsid, created_at) VALUES (?, ?)")
        .bind(crsid)
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(())
}

/// Grant a super capability, creating the user if needed
pub async fn grant_capability(
    pool: &SqlitePool,
    crsid: &str,
    capability: Capability,
) -> Result<()> {
    ensure_user(pool, crsid).await?;

    sqlx::query("INSERT OR IGNORE INTO user_capabilities (crsid, capability) VALUES (?, ?)")
        .bind(crsid)
        .bind(capability.codename())
        .execute(pool)
        .await?;

    info!(crsid, capability = %capability, "Granted capability");
    Ok(())
}

/// Revoke a super capability; returns whether it was held
pub async fn revoke_capability(
    pool: &SqlitePool,
    crsid: &str,
    capability: Capability,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_capabilities WHERE crsid = ? AND capability = ?")
        .bind(crsid)
        .bind(capability.codename())
        .execute(pool)
        .await?;

    let revoked = result.rows_affected() > 0;
    if revoked {
        info!(crsid, capability = %capability, "Revoked capability");
    }
    Ok(revoked)
}

/// Build the principal for a crsid with its stored capabilities
///
/// Unknown capability codenames are skipped with a warning.
pub async fn load_principal(pool: &SqlitePool, crsid: &str) -> Result<Principal> {
    let codenames: Vec<String> =
        sqlx::query_scalar("SELECT capability FROM user_capabilities WHERE crsid = ?")
            .bind(crsid)
            .fetch_all(pool)
            .await?;

    let capabilities = codenames.iter().filter_map(|codename| {
        codename
            .parse::<Capability>()
            .map_err(|e| warn!(crsid, codename = %codename, "Ignoring stored capability: {}", e))
            .ok()
    });

    Ok(Principal::with_capabilities(crsid, capabilities))
}

/// Start a session for a crsid; returns the token to hand to the client
pub async fn create_session(pool: &SqlitePool, crsid: &str, ttl: Duration) -> Result<String> {
    if ttl <= Duration::zero() {
        return Err(Error::InvalidInput("session lifetime must be positive".to_string()));
    }
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| Error::InvalidInput("session lifetime is out of range".to_string()))?;
    ensure_user(pool, crsid).await?;

    let token = make_secret();

    sqlx::query(
        "INSERT INTO sessions (token_hash, crsid, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(hash_token(&token))
    .bind(crsid)
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await?;

    info!(crsid, expires_at = %expires_at, "Created session");
    Ok(token)
}

/// Resolve a session token to its principal
///
/// Unknown and expired tokens yield `None`.
pub async fn principal_for_session(pool: &SqlitePool, token: &str) -> Result<Option<Principal>> {
    let session: Option<(String, DateTime<Utc>)> =
        sqlx::query_as("SELECT crsid, expires_at FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .fetch_optional(pool)
            .await?;

    match session {
        Some((crsid, expires_at)) if expires_at > Utc::now() => {
            Ok(Some(load_principal(pool, &crsid).await?))
        }
        Some((crsid, _)) => {
            debug!(crsid = %crsid, "Session expired");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Delete expired sessions; returns how many were removed
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_hex_sha256() {
        let hash = hash_token("secret");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_token("secret"));
        assert_ne!(hash, hash_token("secret2"));
    }
}
