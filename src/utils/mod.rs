//! Utility functions and helpers.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Lowercase path extension of a URL, with leading dot.
pub fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let dot = last.rfind('.')?;
    if dot == 0 || dot == last.len() - 1 {
        return None;
    }
    Some(last[dot..].to_lowercase())
}

/// Base filename of a URL path without its extension.
pub fn path_file_stem(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let stem = match last.rfind('.') {
        Some(0) | None => last,
        Some(dot) => &last[..dot],
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();

/// Replace characters that are unsafe in filesystem names.
pub fn sanitize_filename(name: &str) -> String {
    let re = UNSAFE_CHARS.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("pattern is valid"));
    re.replace_all(name, "_").trim().to_string()
}
