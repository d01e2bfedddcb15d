//! Acquisition orchestrator.
//!
//! Runs retrieval (and the optional transform) as one cancellable unit of work
//! bound to the request deadline, races it against an external interrupt, and
//! cleans partial artifacts out of the output root on every non-success path.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use docbinder_shared::{AcquisitionOutcome, AcquisitionRequest, BinderError, Result};

use crate::cleanup;
use crate::process::{CommandSpec, ProcessRunner};
use crate::retrieval;

/// Drives one acquisition run.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    runner: ProcessRunner,
}

impl Orchestrator {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    /// An orchestrator whose runner uses the request's termination grace period.
    pub fn for_request(request: &AcquisitionRequest) -> Self {
        Self::new(ProcessRunner::new(request.termination_grace))
    }

    /// Acquire `request` with the standard retrieval command.
    ///
    /// `Err` is reserved for configuration problems found before anything
    /// runs; every other ending is reported through [`AcquisitionOutcome`].
    pub async fn acquire<F>(
        &self,
        request: &AcquisitionRequest,
        interrupt: F,
    ) -> Result<AcquisitionOutcome>
    where
        F: Future<Output = ()>,
    {
        let command = retrieval::retrieval_command(request);
        self.acquire_with(request, command, interrupt).await
    }

    /// Acquire `request` using an explicit retrieval command.
    #[instrument(skip_all, fields(source = %request.source, output_root = %request.output_root.display()))]
    pub async fn acquire_with<F>(
        &self,
        request: &AcquisitionRequest,
        command: CommandSpec,
        interrupt: F,
    ) -> Result<AcquisitionOutcome>
    where
        F: Future<Output = ()>,
    {
        prepare_output_root(&request.output_root)?;

        let deadline = Instant::now() + request.deadline;
        let cancel = CancellationToken::new();

        info!(
            deadline_secs = request.deadline.as_secs(),
            depth = request.max_depth,
            "starting acquisition"
        );

        let unit = fetch(&self.runner, request, &command, deadline, cancel.child_token());
        tokio::pin!(unit);

        let outcome = tokio::select! {
            result = &mut unit => match result {
                Ok(root) => AcquisitionOutcome::Success { root },
                Err(e) => AcquisitionOutcome::Failure(e),
            },
            () = interrupt => {
                warn!("interrupt received, cancelling acquisition");
                cancel.cancel();
                // Let the child wind down before cleanup touches its files.
                if let Err(e) = unit.await {
                    info!(error = %e, "acquisition stopped");
                }
                AcquisitionOutcome::Interrupted
            }
        };

        match &outcome {
            AcquisitionOutcome::Success { root } => {
                info!(root = %root.display(), "acquisition complete");
            }
            AcquisitionOutcome::Failure(e) => {
                error!(error = %e, "acquisition failed, cleaning up");
                cleanup::remove_partial_artifacts(&request.output_root, &request.partial_suffixes);
            }
            AcquisitionOutcome::Interrupted => {
                warn!("acquisition interrupted, cleaning up");
                cleanup::remove_partial_artifacts(&request.output_root, &request.partial_suffixes);
            }
        }

        Ok(outcome)
    }
}

/// The cancellable unit of work: retrieval, root check, then transform.
async fn fetch(
    runner: &ProcessRunner,
    request: &AcquisitionRequest,
    command: &CommandSpec,
    deadline: Instant,
    cancel: CancellationToken,
) -> Result<PathBuf> {
    runner.run(command, Some(deadline), &cancel).await?;

    let root = request.acquired_root();
    if !root.is_dir() {
        return Err(BinderError::validation(format!(
            "downloaded directory not found: {}",
            root.display()
        )));
    }

    if let Some(step) = &request.transform {
        info!(script = %step.script.display(), "running post-acquisition transform");
        let transform = retrieval::transform_command(step, &root);
        runner.run(&transform, Some(deadline), &cancel).await?;
    }

    Ok(root)
}

fn prepare_output_root(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root).map_err(|e| {
        BinderError::config(format!(
            "cannot create output directory {}: {e}",
            root.display()
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use docbinder_shared::{AcquisitionConfig, TransformStep};
    use walkdir::WalkDir;

    fn request_in(dir: &Path) -> AcquisitionRequest {
        let config = AcquisitionConfig {
            output_dir: dir.to_string_lossy().into_owned(),
            ..AcquisitionConfig::default()
        };
        let mut request =
            AcquisitionRequest::from_config("https://example.com/docs", &config).unwrap();
        request.termination_grace = Duration::from_secs(2);
        request
    }

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    fn partial_files(root: &Path, request: &AcquisitionRequest) -> usize {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| cleanup::is_partial_artifact(e.path(), &request.partial_suffixes))
            .count()
    }

    fn retrieval(request: &AcquisitionRequest, script: &str) -> CommandSpec {
        sh(script).current_dir(&request.output_root)
    }

    #[tokio::test]
    async fn success_leaves_tree_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path());
        let command = retrieval(
            &request,
            "mkdir -p example.com && echo '<html></html>' > example.com/index.html && touch keep.tmp",
        );

        let outcome = Orchestrator::for_request(&request)
            .acquire_with(&request, command, std::future::pending())
            .await
            .unwrap();

        let root = outcome.into_result().unwrap();
        assert_eq!(root, dir.path().join("example.com"));
        assert!(root.join("index.html").exists());
        // Success never triggers cleanup.
        assert!(dir.path().join("keep.tmp").exists());
    }

    #[tokio::test]
    async fn failing_retrieval_cleans_partials() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path());
        let command = retrieval(
            &request,
            "mkdir -p example.com && touch example.com/page.html.tmp && touch example.com/ok.html && exit 4",
        );

        let outcome = Orchestrator::for_request(&request)
            .acquire_with(&request, command, std::future::pending())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            AcquisitionOutcome::Failure(BinderError::ProcessFailed { code: Some(4), .. })
        ));
        assert_eq!(partial_files(dir.path(), &request), 0);
        assert!(dir.path().join("example.com/ok.html").exists());
    }

    #[tokio::test]
    async fn deadline_is_failure_and_cleans() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request_in(dir.path());
        request.deadline = Duration::from_millis(300);
        let command = retrieval(&request, "touch transfer.wget && exec sleep 10");

        let started = std::time::Instant::now();
        let outcome = Orchestrator::for_request(&request)
            .acquire_with(&request, command, std::future::pending())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            AcquisitionOutcome::Failure(BinderError::DeadlineExceeded { .. })
        ));
        assert_eq!(partial_files(dir.path(), &request), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn interrupt_wins_and_cleans() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path());
        let command = retrieval(&request, "touch transfer.tmp && exec sleep 10");

        let started = std::time::Instant::now();
        let outcome = Orchestrator::for_request(&request)
            .acquire_with(
                &request,
                command,
                tokio::time::sleep(Duration::from_millis(300)),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, AcquisitionOutcome::Interrupted));
        assert_eq!(partial_files(dir.path(), &request), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn port_bearing_source_finds_its_host_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = AcquisitionConfig {
            output_dir: dir.path().to_string_lossy().into_owned(),
            ..AcquisitionConfig::default()
        };
        let request =
            AcquisitionRequest::from_config("https://example.com:8443/docs", &config).unwrap();
        let command = retrieval(&request, "mkdir -p 'example.com+8443/docs'");

        let root = Orchestrator::for_request(&request)
            .acquire_with(&request, command, std::future::pending())
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(root, dir.path().join("example.com+8443"));
    }

    #[tokio::test]
    async fn missing_acquired_root_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path());
        let command = retrieval(&request, "exit 0");

        let outcome = Orchestrator::for_request(&request)
            .acquire_with(&request, command, std::future::pending())
            .await
            .unwrap();

        let err = outcome.into_result().unwrap_err();
        assert!(err.to_string().contains("downloaded directory not found"));
    }

    #[tokio::test]
    async fn transform_failure_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("convert.sh");
        fs::write(&script, "test -d \"$1\" || exit 9\nexit 2\n").unwrap();

        let mut request = request_in(dir.path());
        request.transform = Some(TransformStep {
            interpreter: "sh".into(),
            script,
        });
        let command = retrieval(&request, "mkdir -p example.com && touch example.com/x.tmp");

        let outcome = Orchestrator::for_request(&request)
            .acquire_with(&request, command, std::future::pending())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            AcquisitionOutcome::Failure(BinderError::ProcessFailed { code: Some(2), .. })
        ));
        assert_eq!(partial_files(dir.path(), &request), 0);
    }

    #[tokio::test]
    async fn interrupt_stops_processes_started_by_transform() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("convert.sh");
        fs::write(&script, "sh -c 'sleep 1; touch \"$0/late.tmp\"' \"$1\"\n").unwrap();

        let mut request = request_in(dir.path());
        request.transform = Some(TransformStep {
            interpreter: "sh".into(),
            script,
        });
        let command = retrieval(&request, "mkdir -p example.com");

        let outcome = Orchestrator::for_request(&request)
            .acquire_with(
                &request,
                command,
                tokio::time::sleep(Duration::from_millis(300)),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, AcquisitionOutcome::Interrupted));

        // Long enough for an orphaned writer to have finished.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("example.com/late.tmp").exists());
        assert_eq!(partial_files(dir.path(), &request), 0);
    }

    #[tokio::test]
    async fn transform_receives_acquired_root() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("convert.sh");
        fs::write(&script, "touch \"$1/transformed\"\n").unwrap();

        let mut request = request_in(dir.path());
        request.transform = Some(TransformStep {
            interpreter: "sh".into(),
            script,
        });
        let command = retrieval(&request, "mkdir -p example.com");

        let root = Orchestrator::for_request(&request)
            .acquire_with(&request, command, std::future::pending())
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert!(root.join("transformed").exists());
    }

    #[tokio::test]
    async fn missing_retrieval_program_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request_in(dir.path());
        request.retrieval_program = "docbinder-no-such-retriever".into();

        let outcome = Orchestrator::for_request(&request)
            .acquire(&request, std::future::pending())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            AcquisitionOutcome::Failure(BinderError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn uncreatable_output_root_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let request = request_in(&blocker.join("mirror"));

        let err = Orchestrator::for_request(&request)
            .acquire_with(&request, sh("exit 0"), std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, BinderError::Config { .. }));
    }
}
