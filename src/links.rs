//! Best-effort link discovery over raw HTML and CSS text.
//!
//! This is text scanning, not parsing. Some valid references are missed;
//! in exchange the extractor has no opinion about malformed markup.

use std::sync::LazyLock;

use regex::Regex;

/// `<img ...>`, `<link ...>` and `<script ...>` opening tags.
static ASSET_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:img|link|script)\b[^>]*>").expect("asset tag pattern is valid")
});

/// `name=value` pairs inside a tag; the value may be double, single or unquoted.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute pattern is valid")
});

/// `url(/path)` with optional quotes.
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?(/[^"')\s]*)["']?\s*\)"#).expect("css url pattern is valid")
});

fn strip_newlines(text: &str) -> String {
    text.replace(['\r', '\n'], "")
}

fn is_asset_path(value: &str) -> bool {
    value.starts_with('/') && !value.starts_with("//")
}

/// Returns root-relative values of `attr` on `img`, `link` and `script` tags.
///
/// Protocol-relative values (`//host/...`) and directory-like values ending
/// in `/` are left out. Order follows the document; repeated values are kept.
pub fn extract_links(html: &str, attr: &str) -> Vec<String> {
    let html = strip_newlines(html);
    let mut links = Vec::new();

    for tag in ASSET_TAG.find_iter(&html) {
        for caps in ATTRIBUTE.captures_iter(tag.as_str()) {
            if !caps[1].eq_ignore_ascii_case(attr) {
                continue;
            }
            let Some(value) = caps.get(2).or(caps.get(3)).or(caps.get(4)) else {
                continue;
            };
            let value = value.as_str().trim();
            if is_asset_path(value) && !value.ends_with('/') {
                links.push(value.to_string());
            }
        }
    }

    links
}

/// Returns the paths referenced by `url(/...)` in a stylesheet.
pub fn extract_css_links(css: &str) -> Vec<String> {
    let css = strip_newlines(css);
    CSS_URL
        .captures_iter(&css)
        .map(|caps| caps[1].to_string())
        .filter(|path| is_asset_path(path))
        .collect()
}

/// All links found in a document: `href` values, then `src` values, then
/// CSS `url(...)` references embedded in the markup.
pub fn discover(document: &str) -> Vec<String> {
    let mut links = extract_links(document, "href");
    links.extend(extract_links(document, "src"));
    links.extend(extract_css_links(document));
    links
}

/// Whether `path` names a stylesheet whose own references should be mirrored.
pub fn is_stylesheet(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.to_ascii_lowercase().ends_with(".css")
}
