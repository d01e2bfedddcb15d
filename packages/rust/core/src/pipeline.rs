//! End-to-end pipelines: local tree → discovery → sanitize → aggregate → render,
//! optionally preceded by acquisition.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use docbinder_acquire::Orchestrator;
use docbinder_discovery::{DiscoveryOptions, discover};
use docbinder_shared::{
    AcquisitionRequest, AppConfig, BinderError, DiscoveredDocument, RenderConfig, Result, Section,
};

use crate::assembler::{self, AssembleOptions};
use crate::render::{self, RenderResult, RenderSink};
use crate::toc;

/// Phase name reported while the retrieval subprocess owns the terminal.
pub const ACQUIRE_PHASE: &str = "Acquiring remote tree";

/// Configuration for the `bind` pipeline.
#[derive(Debug, Clone)]
pub struct BindConfig {
    pub discovery: DiscoveryOptions,
    pub document: AssembleOptions,
    pub render: RenderConfig,
    /// Maximum documents read and sanitized at once.
    pub read_concurrency: usize,
    /// Directory receiving the combined markup and the rendered artifact.
    pub work_dir: PathBuf,
}

impl BindConfig {
    pub fn from_app(config: &AppConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            discovery: DiscoveryOptions::from(&config.discovery),
            document: AssembleOptions::from(&config.document),
            render: config.render.clone(),
            read_concurrency: config.document.read_concurrency,
            work_dir: work_dir.into(),
        }
    }
}

/// Result of the `bind` pipeline.
#[derive(Debug, Clone)]
pub struct BindResult {
    /// Documents found by discovery.
    pub discovered: usize,
    /// Chapters in the rendered document.
    pub sections: usize,
    /// Documents skipped as unreadable, bodiless, or unrenderable.
    pub skipped: usize,
    pub artifact: RenderResult,
    pub elapsed: Duration,
}

/// Result of the `run` pipeline.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Root of the acquired tree.
    pub acquired_root: PathBuf,
    pub bind: BindResult,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a document has been read and sanitized (or skipped).
    fn document_processed(&self, path: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &BindResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_processed(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BindResult) {}
}

// ---------------------------------------------------------------------------
// bind
// ---------------------------------------------------------------------------

/// Bind the document tree under `input_root` into one rendered artifact.
///
/// Unreadable or bodiless documents are logged and skipped. Finding no
/// documents at all is fatal.
#[instrument(skip_all, fields(input = %input_root.display()))]
pub async fn bind<S: RenderSink>(
    input_root: &Path,
    config: &BindConfig,
    sink: &S,
    progress: &dyn ProgressReporter,
) -> Result<BindResult> {
    let start = Instant::now();

    // --- Phase 1: Discovery ---
    progress.phase("Discovering documents");
    let root = input_root.to_path_buf();
    let discovery = config.discovery.clone();
    let documents = tokio::task::spawn_blocking(move || discover(&root, &discovery))
        .await
        .map_err(|e| BinderError::validation(format!("discovery task failed: {e}")))??;

    if documents.is_empty() {
        return Err(BinderError::NoDocuments {
            root: input_root.to_path_buf(),
        });
    }

    // --- Phase 2: Read + sanitize ---
    progress.phase("Sanitizing documents");
    let sections = collect_sections(&documents, config, progress).await;

    // --- Phase 3: Aggregate ---
    progress.phase("Assembling document");
    let doc = assembler::aggregate(&sections, &config.document);
    if doc.section_count() == 0 {
        warn!(discovered = documents.len(), "every document was skipped");
        return Err(BinderError::NoDocuments {
            root: input_root.to_path_buf(),
        });
    }

    // --- Phase 4: Render ---
    progress.phase("Rendering");
    let artifact = render::dispatch(&doc, &config.render, &config.work_dir, sink).await?;

    let result = BindResult {
        discovered: documents.len(),
        sections: doc.section_count(),
        skipped: documents.len() - doc.section_count(),
        artifact,
        elapsed: start.elapsed(),
    };

    info!(
        discovered = result.discovered,
        sections = result.sections,
        skipped = result.skipped,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "bind complete"
    );
    progress.done(&result);
    Ok(result)
}

/// Read and sanitize every document concurrently, returning sections in
/// traversal order.
async fn collect_sections(
    documents: &[DiscoveredDocument],
    config: &BindConfig,
    progress: &dyn ProgressReporter,
) -> Vec<Section> {
    let semaphore = Arc::new(Semaphore::new(config.read_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, doc) in documents.iter().cloned().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let body = load_body(&doc.path).await;
            (index, doc, body)
        });
    }

    let total = documents.len();
    let mut processed = 0;
    let mut sections: Vec<(usize, Section)> = Vec::with_capacity(total);

    while let Some(joined) = tasks.join_next().await {
        processed += 1;
        let (index, doc, body) = match joined {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "document task failed");
                continue;
            }
        };
        let shown = doc.relative.to_string_lossy();
        progress.document_processed(&shown, processed, total);

        match body {
            Ok(Some(body)) => {
                let title = toc::section_title(&doc, &config.discovery);
                debug!(path = %shown, %title, "document sanitized");
                sections.push((index, Section { title, body }));
            }
            Ok(None) => {
                warn!(path = %shown, "document has no body content, skipping");
            }
            Err(e) => {
                warn!(path = %shown, error = %e, "document unreadable, skipping");
            }
        }
    }

    // Completion order is arbitrary; restore traversal order.
    sections.sort_by_key(|(index, _)| *index);
    sections.into_iter().map(|(_, section)| section).collect()
}

async fn load_body(path: &Path) -> Result<Option<String>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BinderError::io(path, e))?;
    let html = String::from_utf8_lossy(&bytes);
    Ok(docbinder_sanitize::sanitize(&html))
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Acquire `request`, then bind the acquired tree (or `input_override`).
///
/// `interrupt` cancels acquisition (with cleanup) and aborts a bind in
/// progress. An interrupted run returns [`BinderError::Interrupted`].
#[instrument(skip_all, fields(source = %request.source))]
pub async fn run<S: RenderSink>(
    request: &AcquisitionRequest,
    input_override: Option<&Path>,
    config: &BindConfig,
    sink: &S,
    interrupt: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    progress.phase(ACQUIRE_PHASE);
    let outcome = Orchestrator::for_request(request)
        .acquire(request, interrupt.cancelled())
        .await?;
    let acquired_root = outcome.into_result()?;

    let input = input_override.unwrap_or(&acquired_root);
    info!(input = %input.display(), "binding acquired tree");

    let bind = tokio::select! {
        result = bind(input, config, sink, progress) => result?,
        () = interrupt.cancelled() => {
            warn!("interrupt received, abandoning bind");
            render::discard_partial(&config.render, &config.work_dir).await;
            return Err(BinderError::Interrupted);
        }
    };

    Ok(RunResult {
        acquired_root,
        bind,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    use docbinder_shared::AcquisitionConfig;

    /// Captures the combined markup and writes a stub artifact.
    #[derive(Default)]
    struct CaptureSink {
        html: Mutex<Option<String>>,
    }

    impl RenderSink for CaptureSink {
        fn name(&self) -> &str {
            "capture"
        }

        async fn render(&self, input: &Path, output: &Path, _layout: &RenderConfig) -> Result<()> {
            let html = fs::read_to_string(input).map_err(|e| BinderError::io(input, e))?;
            *self.html.lock().unwrap() = Some(html);
            fs::write(output, b"%PDF").map_err(|e| BinderError::io(output, e))
        }
    }

    impl CaptureSink {
        fn html(&self) -> String {
            self.html.lock().unwrap().clone().unwrap()
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        processed: Mutex<usize>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn document_processed(&self, _path: &str, _current: usize, _total: usize) {
            *self.processed.lock().unwrap() += 1;
        }
        fn done(&self, _result: &BindResult) {}
    }

    fn write(root: &Path, rel: &str, html: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, html).unwrap();
    }

    fn page(text: &str) -> String {
        format!("<html><head><script>x()</script></head><body><p>{text}</p></body></html>")
    }

    fn config(work_dir: &Path) -> BindConfig {
        BindConfig::from_app(&AppConfig::default(), work_dir)
    }

    #[tokio::test]
    async fn binds_tree_in_traversal_order() {
        let input = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write(input.path(), "a/index.html", &page("A"));
        write(input.path(), "b/page.html", &page("B"));
        write(input.path(), "c/index.html", &page("C"));

        let sink = CaptureSink::default();
        let mut config = config(work.path());
        config.read_concurrency = 2;
        let result = bind(input.path(), &config, &sink, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.discovered, 3);
        assert_eq!(result.sections, 3);
        assert_eq!(result.skipped, 0);
        assert!(result.artifact.artifact.exists());

        let html = sink.html();
        let a = html.find("<h2>a</h2>").unwrap();
        let b = html.find("<h2>b → page</h2>").unwrap();
        let c = html.find("<h2>c</h2>").unwrap();
        assert!(a < b && b < c);
        assert!(!html.contains("x()"));
    }

    #[tokio::test]
    async fn order_survives_uneven_completion() {
        let input = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let count = 40;
        let mut expected = Vec::with_capacity(count);
        for i in 0..count {
            // Early documents are the largest, so they tend to finish last.
            let padding = "x".repeat((count - i) * (count - i) * 256);
            write(
                input.path(),
                &format!("d{i:02}/index.html"),
                &page(&format!("{i} {padding}")),
            );
            expected.push(format!("d{i:02}"));
        }

        let sink = CaptureSink::default();
        let mut config = config(work.path());
        config.read_concurrency = 8;
        let result = bind(input.path(), &config, &sink, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.sections, count);

        let html = scraper::Html::parse_document(&sink.html());
        let heading = scraper::Selector::parse("div.chapter > h2").unwrap();
        let titles: Vec<String> = html
            .select(&heading)
            .map(|h| h.text().collect::<String>())
            .collect();
        assert_eq!(titles, expected);

        let toc = scraper::Selector::parse("ul.toc a").unwrap();
        let listed: Vec<String> = html
            .select(&toc)
            .map(|a| a.text().collect::<String>())
            .collect();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn bodiless_and_undecodable_documents_are_handled() {
        let input = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write(
            input.path(),
            "frames.html",
            "<html><head></head><frameset><frame src=\"a.html\"></frameset></html>",
        );
        write(input.path(), "good.html", &page("good"));
        fs::write(
            input.path().join("latin1.html"),
            b"<html><body><p>caf\xe9</p></body></html>",
        )
        .unwrap();

        let sink = CaptureSink::default();
        let progress = RecordingProgress::default();
        let result = bind(input.path(), &config(work.path()), &sink, &progress)
            .await
            .unwrap();

        assert_eq!(result.discovered, 3);
        assert_eq!(result.sections, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(*progress.processed.lock().unwrap(), 3);
        assert!(sink.html().contains("caf\u{FFFD}"));
        assert_eq!(
            progress.phases.lock().unwrap().first().map(String::as_str),
            Some("Discovering documents")
        );
    }

    #[tokio::test]
    async fn empty_tree_is_no_documents() {
        let input = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write(input.path(), "logo.png", "not markup");

        let err = bind(input.path(), &config(work.path()), &CaptureSink::default(), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, BinderError::NoDocuments { .. }));
        assert!(!work.path().join("combined.html").exists());
    }

    #[tokio::test]
    async fn all_documents_skipped_is_no_documents() {
        let input = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write(input.path(), "empty.html", "<html><body>  </body></html>");

        let err = bind(input.path(), &config(work.path()), &CaptureSink::default(), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, BinderError::NoDocuments { .. }));
    }

    #[cfg(unix)]
    fn request_with(output: &Path, program: &str) -> AcquisitionRequest {
        let config = AcquisitionConfig {
            output_dir: output.to_string_lossy().into_owned(),
            retrieval_program: program.into(),
            ..AcquisitionConfig::default()
        };
        AcquisitionRequest::from_config("https://example.com/docs", &config).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_binds_acquired_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = dir.path().join("mirror");
        let retriever = dir.path().join("fake-wget");
        // Ignores its arguments and lays down a small tree under the host root.
        fs::write(
            &retriever,
            "#!/bin/sh\nmkdir -p example.com/docs\n\
             echo '<html><body><p>Hi</p></body></html>' > example.com/docs/index.html\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&retriever, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let request = request_with(&mirror, &retriever.to_string_lossy());
        let sink = CaptureSink::default();
        let result = run(
            &request,
            None,
            &config(dir.path()),
            &sink,
            &CancellationToken::new(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.acquired_root, mirror.join("example.com"));
        assert_eq!(result.bind.sections, 1);
        assert!(sink.html().contains("<h2>docs</h2>"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_stops_on_failed_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_with(&dir.path().join("mirror"), "false");

        let err = run(
            &request,
            None,
            &config(dir.path()),
            &CaptureSink::default(),
            &CancellationToken::new(),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BinderError::ProcessFailed { .. }));
        assert!(!dir.path().join("combined.html").exists());
    }

    /// Writes a truncated artifact, then stalls.
    #[cfg(unix)]
    struct StallingSink;

    #[cfg(unix)]
    impl RenderSink for StallingSink {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn render(&self, _input: &Path, output: &Path, _layout: &RenderConfig) -> Result<()> {
            fs::write(output, b"%PD").map_err(|e| BinderError::io(output, e))?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_during_render_discards_partial_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();
        let input = dir.path().join("tree");
        write(&input, "index.html", &page("Hi"));

        // Retrieval succeeds at once; the supplied tree is bound instead.
        fs::create_dir_all(dir.path().join("mirror/example.com")).unwrap();
        let request = request_with(&dir.path().join("mirror"), "true");
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let err = run(
            &request,
            Some(&input),
            &config(&work),
            &StallingSink,
            &token,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BinderError::Interrupted));
        assert!(!work.join("documentation.pdf").exists());
        assert!(work.join("combined.html").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancelled_run_is_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_with(&dir.path().join("mirror"), "sleep");
        let token = CancellationToken::new();
        token.cancel();

        let err = run(
            &request,
            None,
            &config(dir.path()),
            &CaptureSink::default(),
            &token,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BinderError::Interrupted));
    }
}
