// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Filtering of file-watcher events before they reach the server.

use anyhow::{Context, Result, anyhow};
use globset::{Glob, GlobMatcher};
use lsp_types::{FileChangeType, FileEvent, Uri};
use std::path::{Path, PathBuf};
use url::Url;

/// A change reported by the editor's file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFileEvent {
    /// Affected file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FileChangeType,
}

impl WatchedFileEvent {
    /// A file was created.
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileChangeType::CREATED,
        }
    }

    /// A file was changed.
    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileChangeType::CHANGED,
        }
    }

    /// A file was deleted.
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileChangeType::DELETED,
        }
    }
}

/// Selects the watcher events the language server subscribed to.
#[derive(Debug, Clone)]
pub struct FileEventFilter {
    pattern: String,
    matcher: GlobMatcher,
}

impl FileEventFilter {
    /// Compiles a filter for `pattern` (e.g. `**/*.sif`).
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid glob.
    pub fn new(pattern: &str) -> Result<Self> {
        let matcher = Glob::new(pattern)
            .with_context(|| format!("Invalid file watcher pattern: {pattern}"))?
            .compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// The glob this filter was built from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `path` is covered by the pattern.
    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }

    /// Converts the matching events to LSP file events.
    ///
    /// Events for paths that cannot be expressed as `file://` URIs (relative
    /// paths) are dropped.
    pub fn select(&self, events: &[WatchedFileEvent]) -> Vec<FileEvent> {
        events
            .iter()
            .filter(|event| self.matches(&event.path))
            .filter_map(|event| {
                let uri = file_uri(&event.path).ok()?;
                Some(FileEvent::new(uri, event.kind))
            })
            .collect()
    }
}

/// Builds a `file://` URI for an absolute path.
///
/// # Errors
///
/// Returns an error if the path is relative or the URI does not parse.
pub fn file_uri(path: &Path) -> Result<Uri> {
    let url = Url::from_file_path(path)
        .map_err(|()| anyhow!("Path is not absolute: {}", path.display()))?;
    url.as_str()
        .parse()
        .map_err(|e| anyhow!("Invalid URI {url}: {e:?}"))
}

/// Builds a `file://` URI for a directory.
///
/// # Errors
///
/// Returns an error if the path is relative or the URI does not parse.
pub fn directory_uri(path: &Path) -> Result<Uri> {
    let url = Url::from_directory_path(path)
        .map_err(|()| anyhow!("Path is not absolute: {}", path.display()))?;
    url.as_str()
        .parse()
        .map_err(|e| anyhow!("Invalid URI {url}: {e:?}"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;

    #[test]
    fn test_sif_glob_matches_nested_files() {
        let filter = FileEventFilter::new("**/*.sif").unwrap();
        assert!(filter.matches(Path::new("/ws/main.sif")));
        assert!(filter.matches(Path::new("/ws/lib/deep/util.sif")));
        assert!(!filter.matches(Path::new("/ws/main.rs")));
        assert!(!filter.matches(Path::new("/ws/main.sif.bak")));
    }

    #[cfg(unix)]
    #[test]
    fn test_select_keeps_matching_events() {
        let filter = FileEventFilter::new("**/*.sif").unwrap();
        let events = vec![
            WatchedFileEvent::created("/ws/new.sif"),
            WatchedFileEvent::changed("/ws/README.md"),
            WatchedFileEvent::deleted("/ws/old.sif"),
            WatchedFileEvent::changed("relative.sif"),
        ];

        let selected = filter.select(&events);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].uri.as_str(), "file:///ws/new.sif");
        assert_eq!(selected[0].typ, FileChangeType::CREATED);
        assert_eq!(selected[1].uri.as_str(), "file:///ws/old.sif");
        assert_eq!(selected[1].typ, FileChangeType::DELETED);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(FileEventFilter::new("**/[.sif").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_uri_escapes_spaces() {
        let uri = file_uri(Path::new("/my ws/a.sif")).unwrap();
        assert_eq!(uri.as_str(), "file:///my%20ws/a.sif");
    }
}
