//! HTML pages

use serde_json::{json, Value};
use ump_common::catalogue::{Channel, MediaItem, MediaType, Playlist};
use ump_common::delivery::{player_embed_url, thumbnail_url, DeliveryVideo};
use ump_common::{Principal, Viewer};

use super::{escape_html, json_for_script, page_shell};

/// Thumbnail widths advertised in structured data
const JSON_LD_THUMBNAIL_WIDTHS: [u32; 3] = [1280, 640, 320];

pub fn home_page(gtag_id: Option<&str>) -> String {
    page_shell(
        "Home",
        gtag_id,
        "",
        r#"        <h1>Media Platform</h1>
        <p>Lectures, talks and recordings from across the University.</p>"#,
    )
}

pub fn about_page(gtag_id: Option<&str>) -> String {
    page_shell(
        "About",
        gtag_id,
        "",
        r#"        <h1>About</h1>
        <p>The Media Platform hosts and delivers University audio and video.</p>"#,
    )
}

/// Landing page for a creation workflow (upload, new media, new playlist)
pub fn creation_page(title: &str, principal: &Principal, gtag_id: Option<&str>) -> String {
    let crsid = principal.crsid().unwrap_or_default();
    let body = format!(
        r#"        <h1>{title}</h1>
        <p class="meta">Signed in as {crsid}</p>
        <div id="app" data-view="{title}"></div>"#,
        title = escape_html(title),
        crsid = escape_html(crsid),
    );
    page_shell(title, gtag_id, "", &body)
}

/// Schema.org description of a media item
pub fn media_json_ld(item: &MediaItem, video: Option<&DeliveryVideo>) -> Value {
    let object_type = match item.media_type {
        MediaType::Audio => "AudioObject",
        _ => "VideoObject",
    };

    let mut json_ld = json!({
        "@context": "http://schema.org",
        "@type": object_type,
        "@id": format!("/media/{}", item.id),
        "name": item.title,
        "description": item.description,
        "duration": format!("PT{}S", item.duration.round() as i64),
    });

    if let Some(published_at) = item.published_at {
        json_ld["uploadDate"] = json!(published_at.to_rfc3339());
    }

    if let Some(video) = video {
        let thumbnails: Vec<String> = JSON_LD_THUMBNAIL_WIDTHS
            .iter()
            .map(|width| thumbnail_url(&video.key, *width))
            .collect();
        json_ld["thumbnailUrl"] = json!(thumbnails);
    }

    json_ld
}

/// The viewer's profile as exposed to page scripts
pub fn profile_json(viewer: &Viewer) -> Value {
    match viewer.principal() {
        Principal::Anonymous => json!({
            "isAnonymous": true,
            "username": null,
            "capabilities": [],
        }),
        Principal::User(user) => json!({
            "isAnonymous": false,
            "username": user.crsid,
            "capabilities": user
                .capabilities
                .iter()
                .map(|capability| capability.codename())
                .collect::<Vec<_>>(),
        }),
    }
}

fn profile_script(viewer: &Viewer) -> String {
    format!(
        "\n    <script type=\"application/profile+json\">{}</script>",
        json_for_script(&profile_json(viewer))
    )
}

/// Media item page; `edit` selects the editing variant
pub struct MediaPage<'a> {
    pub item: &'a MediaItem,
    pub video: Option<&'a DeliveryVideo>,
    pub viewer: &'a Viewer,
    pub can_edit: bool,
    pub edit: bool,
    pub embed_player_key: &'a str,
}

pub fn media_page(page: &MediaPage<'_>, gtag_id: Option<&str>) -> String {
    let item = page.item;

    let head = format!(
        "\n    <script type=\"application/ld+json\">{}</script>{}",
        json_for_script(&media_json_ld(item, page.video)),
        profile_script(page.viewer),
    );

    let player = match page.video {
        Some(video) if !page.embed_player_key.is_empty() => format!(
            r#"
        <iframe class="player" src="{}" allowfullscreen></iframe>"#,
            escape_html(&player_embed_url(&video.key, page.embed_player_key, "html"))
        ),
        _ => String::new(),
    };

    let edit_link = if page.can_edit && !page.edit {
        format!(
            r#"
        <p><a href="/media/{}/edit">Edit</a></p>"#,
            escape_html(&item.id)
        )
    } else {
        String::new()
    };

    let edit_form = if page.edit {
        format!(
            r#"
        <div id="edit" data-item="{}" data-can-edit="{}"></div>"#,
            escape_html(&item.id),
            page.can_edit
        )
    } else {
        String::new()
    };

    let body = format!(
        r#"        <h1>{title}</h1>{player}
        <p>{description}</p>
        <p class="meta">{media_type}, {duration:.0} seconds</p>{edit_link}{edit_form}"#,
        title = escape_html(&item.title),
        player = player,
        description = escape_html(&item.description),
        media_type = item.media_type,
        duration = item.duration,
        edit_link = edit_link,
        edit_form = edit_form,
    );

    page_shell(&item.title, gtag_id, &head, &body)
}

fn item_list(items: &[MediaItem]) -> String {
    if items.is_empty() {
        return "        <p class=\"meta\">No media.</p>".to_string();
    }

    let entries: String = items
        .iter()
        .map(|item| {
            format!(
                "\n            <li><a href=\"/media/{}\">{}</a></li>",
                escape_html(&item.id),
                escape_html(&item.title)
            )
        })
        .collect();

    format!("        <ol class=\"media\">{}\n        </ol>", entries)
}

pub fn channel_page(
    channel: &Channel,
    items: &[MediaItem],
    playlists: &[Playlist],
    viewer: &Viewer,
    gtag_id: Option<&str>,
) -> String {
    let playlist_entries: String = playlists
        .iter()
        .map(|playlist| {
            format!(
                "\n            <li><a href=\"/playlists/{}\">{}</a></li>",
                escape_html(&playlist.id),
                escape_html(&playlist.title)
            )
        })
        .collect();

    let body = format!(
        r#"        <h1>{title}</h1>
        <p>{description}</p>
        <h2>Media</h2>
{items}
        <h2>Playlists</h2>
        <ul class="playlists">{playlists}
        </ul>"#,
        title = escape_html(&channel.title),
        description = escape_html(&channel.description),
        items = item_list(items),
        playlists = playlist_entries,
    );

    page_shell(&channel.title, gtag_id, &profile_script(viewer), &body)
}

pub fn playlist_page(
    playlist: &Playlist,
    items: &[MediaItem],
    viewer: &Viewer,
    edit: bool,
    gtag_id: Option<&str>,
) -> String {
    let edit_form = if edit {
        format!(
            r#"
        <div id="edit" data-playlist="{}"></div>"#,
            escape_html(&playlist.id)
        )
    } else {
        String::new()
    };

    let body = format!(
        r#"        <h1>{title}</h1>
        <p>{description}</p>
{items}{edit_form}"#,
        title = escape_html(&playlist.title),
        description = escape_html(&playlist.description),
        items = item_list(items),
        edit_form = edit_form,
    );

    page_shell(&playlist.title, gtag_id, &profile_script(viewer), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ump_common::lookup::Memberships;
    use ump_common::{Capability, Permission, ResourceKind};

    fn item(title: &str) -> MediaItem {
        let now = Utc::now();
        MediaItem {
            id: "abc".to_string(),
            title: title.to_string(),
            description: "A <em>talk</em>".to_string(),
            media_type: MediaType::Video,
            duration: 54.0,
            published_at: None,
            downloadable: false,
            language: String::new(),
            copyright: String::new(),
            tags: vec![],
            channel_id: None,
            view_permission: Permission::public(),
            sms: None,
            jwp: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_json_ld_thumbnails_follow_delivery_key() {
        let video: DeliveryVideo =
            serde_json::from_value(json!({"key": "mock1", "sources": []})).unwrap();
        let json_ld = media_json_ld(&item("Talk"), Some(&video));

        assert_eq!(json_ld["name"], "Talk");
        assert_eq!(json_ld["@type"], "VideoObject");
        assert_eq!(json_ld["duration"], "PT54S");
        let thumbs = json_ld["thumbnailUrl"].as_array().unwrap();
        assert!(thumbs.contains(&json!("https://cdn.jwplayer.com/thumbs/mock1-1280.jpg")));

        let without = media_json_ld(&item("Talk"), None);
        assert!(without.get("thumbnailUrl").is_none());
    }

    #[test]
    fn test_profile_json() {
        let anon = profile_json(&Viewer::anonymous());
        assert_eq!(anon["isAnonymous"], true);
        assert!(anon["username"].is_null());

        let viewer = Viewer::new(
            Principal::with_capabilities("spqr1", [Capability::view(ResourceKind::MediaItem)]),
            Memberships::default(),
        );
        let profile = profile_json(&viewer);
        assert_eq!(profile["username"], "spqr1");
        assert_eq!(profile["capabilities"], json!(["view_mediaitem"]));
    }

    #[test]
    fn test_media_page_escapes_user_text() {
        let item = item("<some-tag>");
        let viewer = Viewer::anonymous();
        let html = media_page(
            &MediaPage {
                item: &item,
                video: None,
                viewer: &viewer,
                can_edit: false,
                edit: false,
                embed_player_key: "",
            },
            None,
        );

        assert!(!html.contains("<some-tag>"));
        assert!(!html.contains("<em>talk</em>"));
        assert!(html.contains("&lt;some-tag&gt;"));
        assert!(html.contains(r#"<script type="application/ld+json">"#));
        assert!(html.contains(r#"<script type="application/profile+json">"#));
    }
}
