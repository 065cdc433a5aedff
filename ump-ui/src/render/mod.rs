//! Server-side rendering helpers
//!
//! Pages are built with `format!` around a shared shell. All user-supplied
//! text goes through [`escape_html`]; JSON embedded in `<script>` tags goes
//! through [`json_for_script`].

use serde_json::Value;

pub mod feed;
pub mod pages;
pub mod player;

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Serialize JSON so it cannot close or break out of a `<script>` element
pub fn json_for_script(value: &Value) -> String {
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

fn gtag_snippet(gtag_id: &str) -> String {
    let id = escape_html(gtag_id);
    format!(
        r#"
    <script async src="https://www.googletagmanager.com/gtag/js?id={id}"></script>
    <script>
        window.dataLayer = window.dataLayer || [];
        function gtag(){{dataLayer.push(arguments);}}
        gtag('js', new Date());
        gtag('config', '{id}');
    </script>"#,
        id = id
    )
}

/// Wrap page content in the common document shell
///
/// `title` is escaped here; `head` and `body` must already be safe HTML.
pub fn page_shell(title: &str, gtag_id: Option<&str>, head: &str, body: &str) -> String {
    let analytics = gtag_id.map(gtag_snippet).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Media Platform</title>
    <style>
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            margin: 0;
            line-height: 1.6;
        }}
        header {{
            padding: 16px 20px;
            border-bottom: 1px solid #ddd;
        }}
        header a {{
            margin-right: 16px;
        }}
        .content {{
            padding: 0 20px;
        }}
        .meta {{
            color: #666;
            font-size: 14px;
        }}
    </style>{analytics}{head}
</head>
<body>
    <header>
        <a href="/">Media Platform</a>
        <a href="/upload">Upload</a>
        <a href="/about">About</a>
    </header>
    <div class="content">
{body}
    </div>
</body>
</html>
"#,
        title = escape_html(title),
        analytics = analytics,
        head = head,
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<some-tag> & "quoted" 'single'"#),
            "&lt;some-tag&gt; &amp; &quot;quoted&quot; &#x27;single&#x27;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_json_for_script_cannot_close_tag() {
        let value = json!({"name": "</script><script>alert(1)</script>"});
        let encoded = json_for_script(&value);
        assert!(!encoded.contains("</script>"));
        assert!(!encoded.contains('<'));

        // Still valid JSON decoding to the same value
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_shell_includes_gtag_only_when_given() {
        let without = page_shell("Home", None, "", "<p>hi</p>");
        assert!(!without.contains("googletagmanager"));

        let with = page_shell("Home", Some("G-123"), "", "<p>hi</p>");
        assert!(with.contains("googletagmanager.com/gtag/js?id=G-123"));
    }
}
