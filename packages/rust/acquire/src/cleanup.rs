//! Best-effort removal of partial transfer artifacts.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// What a cleanup pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Artifacts that were removed.
    pub removed: Vec<PathBuf>,
    /// Entries that could not be visited or removed.
    pub failures: usize,
}

/// Whether `path`'s file name ends in one of the partial-transfer suffixes.
pub fn is_partial_artifact(path: &Path, suffixes: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    suffixes.iter().any(|s| !s.is_empty() && name.ends_with(s.as_str()))
}

/// Walk `root` and delete every file recognized as a partial artifact.
///
/// Errors are logged and counted, never returned.
#[instrument(skip(suffixes), fields(root = %root.display()))]
pub fn remove_partial_artifacts(root: &Path, suffixes: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();

    if !root.exists() {
        debug!("output root does not exist, nothing to clean");
        return report;
    }

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "cleanup could not visit entry");
                report.failures += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_partial_artifact(entry.path(), suffixes) {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!(path = %entry.path().display(), "removed partial artifact");
                report.removed.push(entry.into_path());
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "failed to remove partial artifact");
                report.failures += 1;
            }
        }
    }

    info!(
        removed = report.removed.len(),
        failures = report.failures,
        "cleanup complete"
    );
    report
}
