//! Render dispatch.
//!
//! Persists the aggregated document, hands it to a [`RenderSink`] with the
//! configured page layout, and verifies the produced artifact. The combined
//! markup is removed after a successful render and kept on failure so it can
//! be inspected. There is no retry.

use std::future::Future;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use docbinder_acquire::{CommandSpec, ProcessRunner};
use docbinder_shared::{BinderError, RenderConfig, Result};

use crate::assembler::AggregatedDocument;

// ---------------------------------------------------------------------------
// RenderSink
// ---------------------------------------------------------------------------

/// Turns a markup file into a paginated artifact.
pub trait RenderSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render `input` to `output` using `layout`.
    fn render(
        &self,
        input: &Path,
        output: &Path,
        layout: &RenderConfig,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Renders through the external `wkhtmltopdf` program.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfSink {
    program: String,
    runner: ProcessRunner,
}

impl WkhtmltopdfSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            runner: ProcessRunner::default(),
        }
    }

    /// Sink for the program named in `layout`.
    pub fn from_config(layout: &RenderConfig) -> Self {
        Self::new(layout.program.clone())
    }

    /// Command line for rendering `input` into `output`.
    pub fn command(&self, input: &Path, output: &Path, layout: &RenderConfig) -> CommandSpec {
        CommandSpec::new(&self.program).args(render_args(input, output, layout))
    }
}

impl RenderSink for WkhtmltopdfSink {
    fn name(&self) -> &str {
        &self.program
    }

    async fn render(&self, input: &Path, output: &Path, layout: &RenderConfig) -> Result<()> {
        let spec = self.command(input, output, layout);
        // Never cancelled; dropping the future kills the child.
        let cancel = CancellationToken::new();
        self.runner
            .run(&spec, None, &cancel)
            .await
            .map_err(into_render_error)
    }
}

/// Global options first, then the page object and its options, then the output.
pub fn render_args(input: &Path, output: &Path, layout: &RenderConfig) -> Vec<String> {
    let margins = &layout.margins;
    let load_handling = if layout.ignore_load_errors {
        "ignore"
    } else {
        "abort"
    };
    let local_access = if layout.enable_local_file_access {
        "--enable-local-file-access"
    } else {
        "--disable-local-file-access"
    };

    let mut args = vec![
        "--dpi".to_string(),
        layout.dpi.to_string(),
        "--margin-top".into(),
        format!("{}mm", margins.top),
        "--margin-bottom".into(),
        format!("{}mm", margins.bottom),
        "--margin-left".into(),
        format!("{}mm", margins.left),
        "--margin-right".into(),
        format!("{}mm", margins.right),
        "--orientation".into(),
        layout.orientation.to_string(),
        "--page-size".into(),
        layout.page_size.clone(),
        "page".into(),
        input.to_string_lossy().into_owned(),
        local_access.into(),
        "--load-error-handling".into(),
        load_handling.into(),
        "--load-media-error-handling".into(),
        load_handling.into(),
    ];
    if !layout.footer_template.is_empty() {
        args.push("--footer-right".into());
        args.push(layout.footer_template.clone());
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

fn into_render_error(e: BinderError) -> BinderError {
    match e {
        BinderError::Render(_) => e,
        other => BinderError::Render(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// A verified render artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub artifact: PathBuf,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the artifact.
    pub sha256: String,
}

/// Write `doc` into `work_dir`, render it through `sink`, and verify the result.
#[instrument(skip_all, fields(sink = sink.name(), work_dir = %work_dir.display()))]
pub async fn dispatch<S: RenderSink>(
    doc: &AggregatedDocument,
    layout: &RenderConfig,
    work_dir: &Path,
    sink: &S,
) -> Result<RenderResult> {
    let combined = work_dir.join(&layout.combined_file);
    let artifact = work_dir.join(&layout.output_file);

    tokio::fs::write(&combined, &doc.html)
        .await
        .map_err(|e| BinderError::io(&combined, e))?;
    info!(
        combined = %combined.display(),
        chapters = doc.section_count(),
        "combined document written"
    );

    let rendered = async {
        sink.render(&combined, &artifact, layout)
            .await
            .map_err(into_render_error)?;
        verify_artifact(&artifact).await
    }
    .await;

    match rendered {
        Ok(result) => {
            if let Err(e) = tokio::fs::remove_file(&combined).await {
                warn!(path = %combined.display(), error = %e, "could not remove combined document");
            }
            info!(
                artifact = %result.artifact.display(),
                size_bytes = result.size_bytes,
                sha256 = %result.sha256,
                "render complete"
            );
            Ok(result)
        }
        Err(e) => {
            error!(
                error = %e,
                combined = %combined.display(),
                "render failed, combined document kept"
            );
            Err(e)
        }
    }
}

/// Remove the artifact of a render abandoned mid-way.
///
/// The combined markup is kept so the bind can be inspected or re-rendered.
pub async fn discard_partial(layout: &RenderConfig, work_dir: &Path) {
    let artifact = work_dir.join(&layout.output_file);
    match tokio::fs::remove_file(&artifact).await {
        Ok(()) => warn!(artifact = %artifact.display(), "removed partial artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(artifact = %artifact.display(), error = %e, "could not remove partial artifact");
        }
    }
    let combined = work_dir.join(&layout.combined_file);
    if tokio::fs::try_exists(&combined).await.unwrap_or(false) {
        info!(combined = %combined.display(), "combined document kept");
    }
}

async fn verify_artifact(artifact: &Path) -> Result<RenderResult> {
    let bytes = tokio::fs::read(artifact).await.map_err(|e| {
        BinderError::Render(format!("artifact {} not readable: {e}", artifact.display()))
    })?;
    if bytes.is_empty() {
        return Err(BinderError::Render(format!(
            "artifact {} is empty",
            artifact.display()
        )));
    }

    Ok(RenderResult {
        artifact: artifact.to_path_buf(),
        size_bytes: bytes.len() as u64,
        sha256: hex_digest(&bytes),
    })
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
