//! Server-side HTML for the gallery pages.

use crate::config::{APP_NAME, APP_VERSION};
use crate::gallery::BlobData;

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} - {app}</title>
  <style>{STYLE}</style>
</head>
<body>
  <header><a class="brand" href="/">{app}</a> <a href="/privacy">Privacy</a></header>
  <main>
{body}
  </main>
  <footer>{app} {version}</footer>
</body>
</html>"#,
        title = escape_html(title),
        app = APP_NAME,
        version = APP_VERSION,
        body = body,
    )
}

/// Gallery page: upload form, search form, optional message, thumbnails.
pub fn index_page(term: Option<&str>, blobs: &[BlobData], message: Option<&str>) -> String {
    let term_value = escape_html(term.unwrap_or_default().trim());

    let mut body = String::new();
    body.push_str(&format!(
        r#"    <section class="toolbar">
      <form method="post" action="/upload" enctype="multipart/form-data">
        <input type="file" name="file" accept="image/*">
        <button type="submit">Upload</button>
      </form>
      <form method="post" action="/search">
        <input type="text" name="term" placeholder="Search photos" value="{term_value}">
        <button type="submit">Search</button>
      </form>
    </section>
"#
    ));

    if let Some(message) = message {
        body.push_str(&format!(
            "    <p class=\"message\" role=\"alert\">{}</p>\n",
            escape_html(message)
        ));
    }

    if blobs.is_empty() {
        body.push_str("    <p class=\"empty\">No photos to show.</p>\n");
    } else {
        body.push_str("    <ul class=\"gallery\">\n");
        for blob in blobs {
            body.push_str(&format!(
                "      <li><a href=\"{image}\" title=\"{caption}\"><img src=\"{thumb}\" alt=\"{caption}\"></a><span>{caption}</span></li>\n",
                image = escape_html(&blob.image_uri),
                thumb = escape_html(&blob.thumbnail_uri),
                caption = escape_html(&blob.caption),
            ));
        }
        body.push_str("    </ul>\n");
    }

    layout("Home", &body)
}

pub fn privacy_page() -> String {
    layout(
        "Privacy",
        "    <h1>Privacy</h1>\n    <p>Uploaded photos are stored in blob storage and sent to a computer-vision service to generate captions and tags.</p>\n",
    )
}

pub fn error_page(request_id: Option<&str>) -> String {
    let mut body = String::from(
        "    <h1 class=\"error\">Error.</h1>\n    <p>An error occurred while processing your request.</p>\n",
    );
    if let Some(id) = request_id {
        body.push_str(&format!(
            "    <p><strong>Request ID:</strong> <code>{}</code></p>\n",
            escape_html(id)
        ));
    }
    layout("Error", &body)
}

const STYLE: &str = "body{font-family:sans-serif;margin:0;color:#1c1917}\
header,footer{padding:.75rem 1.5rem;background:#f5f5f4}\
header a{margin-right:1rem}.brand{font-weight:bold}\
main{padding:1.5rem}.toolbar{display:flex;gap:2rem;flex-wrap:wrap}\
.message{color:#b91c1c}.gallery{list-style:none;padding:0;display:flex;flex-wrap:wrap;gap:1rem}\
.gallery li{width:192px}.gallery span{display:block;font-size:.85rem}";
