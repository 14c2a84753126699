//! Discoverable file references.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Maximum display-name length (in graphemes) used in captions and manifests.
const MAX_NAME_GRAPHEMES: usize = 64;

/// Category of a discoverable file, derived from its URL extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Document,
    Image,
    Audio,
    Video,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Document => "document",
            FileKind::Image => "image",
            FileKind::Audio => "audio",
            FileKind::Video => "video",
        }
    }
}

/// A downloadable file discovered on a tracked page.
///
/// Identity is the URL alone. `name` and `kind` are descriptive: two
/// references with the same URL are the same file even if their anchor
/// text differs.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Display name (link text, alt text, or URL basename)
    pub name: String,

    /// Absolute URL of the file
    pub url: String,

    /// File category
    pub kind: FileKind,
}

impl PartialEq for FileRef {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Hash for FileRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl FileRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
        }
    }

    /// Display name truncated on grapheme boundaries.
    pub fn short_name(&self) -> String {
        let graphemes: Vec<&str> = self.name.graphemes(true).collect();
        if graphemes.len() <= MAX_NAME_GRAPHEMES {
            self.name.clone()
        } else {
            let mut out: String = graphemes[..MAX_NAME_GRAPHEMES].concat();
            out.push('…');
            out
        }
    }

    /// Caption sent alongside the file itself.
    pub fn caption(&self) -> String {
        format!("{} ({})\n{}", self.short_name(), self.kind.as_str(), self.url)
    }

    /// One line of a batch manifest.
    pub fn manifest_line(&self) -> String {
        format!("[{}] {}\n{}", self.kind.as_str(), self.short_name(), self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_url_only() {
        let a = FileRef::new("Report", "https://example.com/report.pdf", FileKind::Document);
        let b = FileRef::new("report.pdf", "https://example.com/report.pdf", FileKind::Document);
        assert_eq!(a, b);
    }

    #[test]
    fn different_urls_are_different_files() {
        let a = FileRef::new("a", "https://example.com/a.pdf", FileKind::Document);
        let b = FileRef::new("a", "https://example.com/b.pdf", FileKind::Document);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_follows_url_identity() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(FileRef::new("x", "https://example.com/f.png", FileKind::Image));
        set.insert(FileRef::new("y", "https://example.com/f.png", FileKind::Image));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn short_name_truncates_long_names() {
        let long = "x".repeat(200);
        let file = FileRef::new(long, "https://example.com/f.pdf", FileKind::Document);
        let short = file.short_name();
        assert!(short.graphemes(true).count() <= MAX_NAME_GRAPHEMES + 1);
        assert!(short.ends_with('…'));
    }

    #[test]
    fn caption_contains_kind_and_url() {
        let file = FileRef::new("Notes", "https://example.com/notes.pdf", FileKind::Document);
        let caption = file.caption();
        assert!(caption.contains("Notes"));
        assert!(caption.contains("document"));
        assert!(caption.contains("https://example.com/notes.pdf"));
    }
}
