// src/services/extractor.rs

//! File extraction from fetched page content.
//!
//! Turns raw HTML into a deduplicated, typed set of file references:
//! anchors and embeddable media elements whose resolved URL carries an
//! allowed extension.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{ExtractorConfig, FileRef};
use crate::utils::{path_extension, path_file_stem, resolve_url};

/// Elements that can carry a downloadable reference.
const CANDIDATE_SELECTOR: &str = "a[href], img[src], audio[src], video[src], source[src]";

/// Service turning page content into file references.
pub struct FileExtractor {
    config: ExtractorConfig,
    candidates: Selector,
}

impl FileExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let candidates =
            Selector::parse(CANDIDATE_SELECTOR).expect("candidate selector is valid CSS");
        Self { config, candidates }
    }

    /// Extract all allowed file references from `html`, resolved against
    /// `base_url` and deduplicated by URL.
    ///
    /// Output order is document order of first occurrence, so identical
    /// input always diffs identically. Malformed markup degrades to
    /// however much the lenient parser recovers; it is never an error.
    pub fn extract(&self, html: &str, base_url: &Url) -> Vec<FileRef> {
        let document = Html::parse_document(html);

        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for element in document.select(&self.candidates) {
            let Some((href, name)) = Self::candidate(&element) else {
                continue;
            };

            let resolved = resolve_url(base_url, &href);
            let Ok(url) = Url::parse(&resolved) else {
                continue;
            };
            if url.scheme() != "http" && url.scheme() != "https" {
                continue;
            }

            // Extensionless or unknown extensions are silently dropped.
            let Some(ext) = path_extension(&url) else {
                continue;
            };
            let Some(kind) = self.config.kind_for(&ext) else {
                continue;
            };

            let url_string = url.to_string();
            if !seen.insert(url_string.clone()) {
                continue;
            }

            let name = if name.is_empty() {
                path_file_stem(&url).unwrap_or_else(|| url_string.clone())
            } else {
                name
            };

            files.push(FileRef::new(name, url_string, kind));
        }

        files
    }

    /// Pull the reference attribute and display text out of an element.
    fn candidate(element: &ElementRef) -> Option<(String, String)> {
        let value = element.value();
        match value.name() {
            "a" => {
                let href = value.attr("href")?;
                let text: String = element.text().collect();
                Some((href.to_string(), normalize_whitespace(&text)))
            }
            "img" | "audio" | "video" | "source" => {
                let src = value.attr("src")?;
                let name = value
                    .attr("alt")
                    .or_else(|| value.attr("title"))
                    .unwrap_or("");
                Some((src.to_string(), normalize_whitespace(name)))
            }
            _ => None,
        }
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
