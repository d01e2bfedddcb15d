//! Local document tree discovery.
//!
//! Walks an acquired tree depth-first in file-name order and returns the
//! content documents in the order they will appear in the aggregated output.
//! A non-root directory that holds an index document is represented by that
//! document alone; the root directory's index is an ordinary entry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use docbinder_shared::{BinderError, DiscoveredDocument, DiscoveryConfig, Result};

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for the discovery walk.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Content-bearing extensions, without the leading dot, matched case-insensitively.
    pub extensions: Vec<String>,
    /// File stem of the document that represents its directory.
    pub index_stem: String,
    /// Skip the rest of a directory once its index document is emitted.
    pub collapse_indexed_dirs: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::from(&DiscoveryConfig::default())
    }
}

impl From<&DiscoveryConfig> for DiscoveryOptions {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            index_stem: config.index_stem.clone(),
            collapse_indexed_dirs: config.collapse_indexed_dirs,
        }
    }
}

impl DiscoveryOptions {
    /// Whether `path` has a content-bearing extension.
    pub fn is_content(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Whether `path` is an index document.
    pub fn is_index(&self, path: &Path) -> bool {
        self.is_content(path)
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem.eq_ignore_ascii_case(&self.index_stem))
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Discover content documents under `root` in traversal order.
///
/// Unreadable directories are logged and skipped. An empty result is not an
/// error here; the caller decides whether "no documents" is fatal.
#[instrument(skip(opts), fields(root = %root.display()))]
pub fn discover(root: &Path, opts: &DiscoveryOptions) -> Result<Vec<DiscoveredDocument>> {
    if !root.is_dir() {
        return Err(BinderError::config(format!(
            "input directory {} does not exist or is not a directory",
            root.display()
        )));
    }

    let mut documents = Vec::new();
    let mut indexed_dirs: HashSet<PathBuf> = HashSet::new();
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            if entry.depth() == 0 {
                continue;
            }
            if let Some(index) = find_index(entry.path(), opts) {
                debug!(path = %index.display(), "found index document");
                documents.push(DiscoveredDocument::new(root, index));
                indexed_dirs.insert(entry.path().to_path_buf());
                if opts.collapse_indexed_dirs {
                    walker.skip_current_dir();
                }
            }
            continue;
        }

        let path = entry.path();
        if !opts.is_content(path) {
            continue;
        }
        // Nested index documents were already emitted for their directory.
        if entry.depth() > 1 && opts.is_index(path) {
            continue;
        }
        // `X.html` next to an indexed `X/` would duplicate its title; the index wins.
        if indexed_dirs.contains(&path.with_extension("")) {
            debug!(path = %path.display(), "skipping document shadowed by directory index");
            continue;
        }

        debug!(path = %path.display(), "found document");
        documents.push(DiscoveredDocument::new(root, entry.into_path()));
    }

    info!(documents = documents.len(), "discovery complete");
    Ok(documents)
}

/// The index document directly inside `dir`, if any.
///
/// With several candidates (`index.html`, `index.htm`) the first by name wins.
fn find_index(dir: &Path, opts: &DiscoveryOptions) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list directory");
            return None;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| !t.is_dir()))
        .map(|e| e.path())
        .filter(|p| opts.is_index(p))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
