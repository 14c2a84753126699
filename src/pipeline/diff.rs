//! File-set diffing between the stored state and the current page.
//!
//! Identity is the file URL. `new` is everything the page offers that
//! the stored set does not contain; files that vanished from the page
//! are counted for logging but never dropped from the stored set, so a
//! file that reappears later is not re-delivered.

use std::collections::HashSet;

use crate::models::FileRef;

/// Diff of one check cycle's extracted files against the stored set.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Files on the page that are not in the stored set, in extraction order
    pub new_files: Vec<FileRef>,

    /// Count of stored files no longer present on the page
    pub removed: usize,
}

impl DiffResult {
    pub fn has_new_files(&self) -> bool {
        !self.new_files.is_empty()
    }
}

/// Compute the diff between stored and currently extracted files.
pub fn diff_files(stored: &[FileRef], current: &[FileRef]) -> DiffResult {
    let stored_urls: HashSet<&str> = stored.iter().map(|f| f.url.as_str()).collect();
    let current_urls: HashSet<&str> = current.iter().map(|f| f.url.as_str()).collect();

    let new_files: Vec<FileRef> = current
        .iter()
        .filter(|f| !stored_urls.contains(f.url.as_str()))
        .cloned()
        .collect();

    let removed = stored
        .iter()
        .filter(|f| !current_urls.contains(f.url.as_str()))
        .count();

    DiffResult { new_files, removed }
}
