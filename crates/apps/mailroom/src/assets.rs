//! Embedded static assets

use rust_embed::RustEmbed;

use crate::dom::html_escape;

/// Stylesheets embedded from the assets directory
#[derive(RustEmbed)]
#[folder = "assets"]
#[include = "*.css"]
struct Stylesheets;

const STYLESHEET: &str = "mailroom.css";

/// The application stylesheet, empty if it was not embedded
pub fn stylesheet() -> String {
    Stylesheets::get(STYLESHEET)
        .map(|file| String::from_utf8_lossy(&file.data).into_owned())
        .unwrap_or_default()
}

/// Wrap a rendered `body` element into a standalone page
pub fn page_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
{css}
</style>
</head>
{body}
</html>
"#,
        title = html_escape(title),
        css = stylesheet(),
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheet_is_embedded() {
        let css = stylesheet();
        assert!(css.contains(".active_mail"));
        assert!(Stylesheets::iter().all(|name| name.ends_with(".css")));
    }

    #[test]
    fn test_page_html() {
        let page = page_html("Mail & more", "<body><div id=\"alerts\"></div></body>");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Mail &amp; more</title>"));
        assert!(page.contains("</head>\n<body><div id=\"alerts\"></div></body>\n</html>"));
        assert!(page.contains(".badge-warning"));
    }
}
