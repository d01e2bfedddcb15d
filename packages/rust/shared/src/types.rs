//! Core domain types shared by the acquisition and aggregation stages.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::config::AcquisitionConfig;
use crate::error::{BinderError, Result};

// ---------------------------------------------------------------------------
// AcquisitionRequest
// ---------------------------------------------------------------------------

/// A post-acquisition transform: `<interpreter> <script> <acquired-root>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStep {
    pub interpreter: String,
    pub script: PathBuf,
}

/// Everything needed to mirror one remote document tree.
///
/// Built once per run and consumed by the orchestrator.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    /// Remote tree to mirror.
    pub source: Url,
    /// Directory the retrieval process runs in.
    pub output_root: PathBuf,
    /// Recursion depth limit.
    pub max_depth: u32,
    /// Wait between requests.
    pub wait: Duration,
    /// Transfer rate cap in the retrieval tool's notation.
    pub rate_limit: String,
    /// Deadline covering retrieval and transform.
    pub deadline: Duration,
    /// Path prefixes retrieval is restricted to.
    pub include_directories: Vec<String>,
    /// Path prefixes excluded from retrieval.
    pub exclude_directories: Vec<String>,
    /// File name patterns rejected by the retrieval process.
    pub reject_patterns: Vec<String>,
    /// Retrieval executable.
    pub retrieval_program: String,
    /// Optional transform run on the acquired root.
    pub transform: Option<TransformStep>,
    /// Time a terminated process gets before it is killed.
    pub termination_grace: Duration,
    /// File name suffixes marking partial transfers.
    pub partial_suffixes: Vec<String>,
}

impl AcquisitionRequest {
    /// Build a request for `source` from the `[acquisition]` config section.
    pub fn from_config(source: &str, config: &AcquisitionConfig) -> Result<Self> {
        let source = Url::parse(source)
            .map_err(|e| BinderError::config(format!("invalid source URL '{source}': {e}")))?;

        if source.host_str().is_none_or(str::is_empty) {
            return Err(BinderError::config(format!(
                "source URL '{source}' has no host"
            )));
        }

        let include_directories = if config.include_directories.is_empty() {
            let path = source.path().trim_end_matches('/');
            if path.is_empty() {
                Vec::new()
            } else {
                vec![path.to_string()]
            }
        } else {
            config.include_directories.clone()
        };

        let transform = config.transform_script.as_ref().map(|script| TransformStep {
            interpreter: config.transform_interpreter.clone(),
            script: PathBuf::from(script),
        });

        Ok(Self {
            source,
            output_root: PathBuf::from(&config.output_dir),
            max_depth: config.max_depth,
            wait: Duration::from_secs(u64::from(config.wait_seconds)),
            rate_limit: config.rate_limit.clone(),
            deadline: Duration::from_secs(config.timeout_minutes.saturating_mul(60)),
            include_directories,
            exclude_directories: config.exclude_directories.clone(),
            reject_patterns: config.reject_patterns.clone(),
            retrieval_program: config.retrieval_program.clone(),
            transform,
            termination_grace: Duration::from_secs(config.termination_grace_secs),
            partial_suffixes: config.partial_suffixes.clone(),
        })
    }

    /// Host the retrieval is restricted to.
    pub fn domain(&self) -> &str {
        self.source.host_str().unwrap_or_default()
    }

    /// Name of the host directory the retrieval process creates.
    ///
    /// A non-default port is part of it, joined with `+` because retrieval
    /// runs with Windows-safe file names.
    pub fn host_directory(&self) -> String {
        match self.source.port() {
            Some(port) => format!("{}+{port}", self.domain()),
            None => self.domain().to_string(),
        }
    }

    /// Directory the retrieval process mirrors the remote tree into.
    pub fn acquired_root(&self) -> PathBuf {
        self.output_root.join(self.host_directory())
    }
}

// ---------------------------------------------------------------------------
// AcquisitionOutcome
// ---------------------------------------------------------------------------

/// How an acquisition run ended.
#[derive(Debug)]
pub enum AcquisitionOutcome {
    /// The tree was mirrored (and transformed) into `root`.
    Success { root: PathBuf },
    /// Retrieval, deadline, or transform failed.
    Failure(BinderError),
    /// An external interrupt arrived first.
    Interrupted,
}

impl AcquisitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Convert into a `Result`, mapping `Interrupted` to [`BinderError::Interrupted`].
    pub fn into_result(self) -> Result<PathBuf> {
        match self {
            Self::Success { root } => Ok(root),
            Self::Failure(err) => Err(err),
            Self::Interrupted => Err(BinderError::Interrupted),
        }
    }
}

// ---------------------------------------------------------------------------
// DiscoveredDocument / Section
// ---------------------------------------------------------------------------

/// A content document found in the local tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDocument {
    /// Path on disk.
    pub path: PathBuf,
    /// Path relative to the discovery root.
    pub relative: PathBuf,
}

impl DiscoveredDocument {
    pub fn new(root: &Path, path: PathBuf) -> Self {
        let relative = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        Self { path, relative }
    }
}

/// One titled, sanitized unit of content in the aggregated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Display title derived from the document path.
    pub title: String,
    /// Sanitized inner markup of the document body.
    pub body: String,
}
