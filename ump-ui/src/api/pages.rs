//! Static pages and login-gated creation pages

use axum::{
    extract::State,
    http::Uri,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Extension, Router,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::debug;
use ump_common::Principal;

use crate::render::pages::{about_page, creation_page, home_page};
use crate::AppState;

/// GET /
pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(home_page(state.settings.gtag_id.as_deref()))
}

/// GET /about
pub async fn about(State(state): State<AppState>) -> Html<String> {
    Html(about_page(state.settings.gtag_id.as_deref()))
}

/// Characters escaped in the `next` query value; `/` stays readable
const NEXT_VALUE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Login URL that returns the user to `path` afterwards
fn login_redirect_target(login_url: &str, path: &str) -> String {
    format!(
        "{}?next={}",
        login_url,
        utf8_percent_encode(path, NEXT_VALUE_SET)
    )
}

/// Render a creation page, or send anonymous users to sign in first
fn login_required(state: &AppState, principal: &Principal, uri: &Uri, title: &str) -> Response {
    if !principal.is_authenticated() {
        let target = login_redirect_target(&state.settings.login_url, uri.path());
        debug!(path = %uri.path(), "Login required, redirecting");
        return Redirect::to(&target).into_response();
    }

    Html(creation_page(title, principal, state.settings.gtag_id.as_deref())).into_response()
}

/// GET /upload
pub async fn upload(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    uri: Uri,
) -> Response {
    login_required(&state, &principal, &uri, "Upload")
}

/// GET /media/new
pub async fn media_item_new(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    uri: Uri,
) -> Response {
    login_required(&state, &principal, &uri, "New media")
}

/// GET /playlists/new
pub async fn playlist_new(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    uri: Uri,
) -> Response {
    login_required(&state, &principal, &uri, "New playlist")
}

/// Build page routes
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/upload", get(upload))
        .route("/media/new", get(media_item_new))
        .route("/playlists/new", get(playlist_new))
}
