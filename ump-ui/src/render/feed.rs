//! RSS 2.0 feeds for downloadable media

use chrono::{DateTime, Utc};
use ump_common::catalogue::MediaItem;
use ump_common::delivery::DeliveryVideo;

use super::escape_html;

/// Downloadable file attached to a feed entry
#[derive(Debug, Clone)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub description: String,
    pub link: String,
    pub guid: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub enclosure: Option<Enclosure>,
}

impl FeedEntry {
    /// Entry for a media item, enclosing the best download rendition if cached
    pub fn for_item(item: &MediaItem, video: Option<&DeliveryVideo>) -> Self {
        let enclosure = video
            .and_then(DeliveryVideo::best_download_source)
            .map(|source| Enclosure {
                url: source.file.clone(),
                mime_type: source.mime_type.clone(),
            });

        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            link: format!("/media/{}", item.id),
            guid: item.id.clone(),
            pub_date: item.published_at,
            enclosure,
        }
    }
}

fn render_entry(entry: &FeedEntry) -> String {
    let pub_date = entry
        .pub_date
        .map(|date| format!("\n      <pubDate>{}</pubDate>", date.to_rfc2822()))
        .unwrap_or_default();

    let enclosure = entry
        .enclosure
        .as_ref()
        .map(|enclosure| {
            format!(
                "\n      <enclosure url=\"{}\" type=\"{}\" length=\"0\"/>",
                escape_html(&enclosure.url),
                escape_html(&enclosure.mime_type)
            )
        })
        .unwrap_or_default();

    format!(
        r#"
    <item>
      <title>{title}</title>
      <description>{description}</description>
      <link>{link}</link>
      <guid isPermaLink="false">{guid}</guid>{pub_date}{enclosure}
    </item>"#,
        title = escape_html(&entry.title),
        description = escape_html(&entry.description),
        link = escape_html(&entry.link),
        guid = escape_html(&entry.guid),
        pub_date = pub_date,
        enclosure = enclosure,
    )
}

/// Render a complete RSS document
pub fn rss(title: &str, link: &str, description: &str, entries: &[FeedEntry]) -> String {
    let items: String = entries.iter().map(render_entry).collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>{title}</title>
    <link>{link}</link>
    <description>{description}</description>{items}
  </channel>
</rss>
"#,
        title = escape_html(title),
        link = escape_html(link),
        description = escape_html(description),
        items = items,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rss_escapes_text() {
        let entry = FeedEntry {
            title: "<b>Bold</b> & more".to_string(),
            description: String::new(),
            link: "/media/abc".to_string(),
            guid: "abc".to_string(),
            pub_date: None,
            enclosure: Some(Enclosure {
                url: "http://cdn.invalid/vid1.mp4?a=1&b=2".to_string(),
                mime_type: "video/mp4".to_string(),
            }),
        };

        let xml = rss("Feed", "/media/abc", "desc", &[entry]);
        assert!(xml.contains("&lt;b&gt;Bold&lt;/b&gt; &amp; more"));
        assert!(xml.contains("url=\"http://cdn.invalid/vid1.mp4?a=1&amp;b=2\""));
        assert!(!xml.contains("<b>"));
        assert!(!xml.contains("<pubDate>"));
    }

    #[test]
    fn test_empty_feed() {
        let xml = rss("Empty", "/playlists/x", "", &[]);
        assert!(xml.starts_with("<?xml"));
        assert!(!xml.contains("<item>"));
    }
}
