//! Session middleware and session housekeeping
//!
//! Resolves the request principal from the session cookie. Requests without
//! a cookie, or with an unknown or expired token, proceed as anonymous.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use cookie::{Cookie, CookieJar};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ump_common::session::{principal_for_session, purge_expired_sessions};
use ump_common::Principal;

use crate::{ApiError, AppState};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "ump_session";

/// Parse every Cookie header into a jar; malformed pairs are skipped
fn parse_cookies(headers: &HeaderMap) -> CookieJar {
    let mut jar = CookieJar::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for chunk in raw.split(';').map(str::trim) {
            if let Ok(cookie) = Cookie::parse(chunk) {
                jar.add_original(cookie.into_owned());
            }
        }
    }
    jar
}

/// Extract the session token from the Cookie headers
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookies(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|token| !token.is_empty())
}

/// Delete expired sessions now and then every `period`
pub fn spawn_session_purge(db: SqlitePool, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match purge_expired_sessions(&db).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged expired sessions"),
                Err(e) => warn!("Session purge failed: {}", e),
            }
        }
    })
}

/// Attach the request principal as an extension
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match session_token(request.headers()) {
        Some(token) => principal_for_session(&state.db, &token)
            .await?
            .unwrap_or_default(),
        None => Principal::Anonymous,
    };

    debug!(
        crsid = principal.crsid().unwrap_or("-"),
        path = %request.uri().path(),
        "Resolved request principal"
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
