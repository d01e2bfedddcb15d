//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docbinder_acquire::{Orchestrator, ShutdownSignal};
use docbinder_core::pipeline::{self, ACQUIRE_PHASE, BindConfig, BindResult, ProgressReporter};
use docbinder_core::render::{self, WkhtmltopdfSink};
use docbinder_shared::{
    AcquisitionOutcome, AcquisitionRequest, AppConfig, BinderError, init_config, load_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docbinder — bind a documentation site into a single printable document.
#[derive(Parser)]
#[command(
    name = "docbinder",
    version,
    about = "Mirror a documentation site and bind it into a single PDF.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.docbinder/docbinder.toml).
    #[arg(long, global = true, env = "DOCBINDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Mirror a remote documentation tree.
    Fetch {
        #[command(flatten)]
        acquire: AcquireArgs,
    },

    /// Bind an existing local tree into one document.
    Bind {
        /// Root of the local tree (defaults to the acquired root of the configured source).
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Mirror a remote tree, then bind it.
    Run {
        #[command(flatten)]
        acquire: AcquireArgs,

        /// Bind this directory instead of the acquired root.
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Acquisition overrides.
#[derive(Args)]
pub(crate) struct AcquireArgs {
    /// Source URL (defaults to `acquisition.source_url`).
    pub url: Option<String>,

    /// Directory the tree is mirrored into.
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Maximum recursion depth.
    #[arg(long)]
    pub depth: Option<u32>,

    /// Acquisition deadline in minutes.
    #[arg(long)]
    pub timeout_minutes: Option<u64>,

    /// Script run over the acquired root after retrieval.
    #[arg(long)]
    pub transform: Option<String>,
}

/// Render output overrides.
#[derive(Args)]
pub(crate) struct OutputArgs {
    /// Rendered document path.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Document title.
    #[arg(long)]
    pub title: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docbinder=info",
        1 => "docbinder=debug",
        _ => "docbinder=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Fetch { acquire } => cmd_fetch(config_path, &acquire).await,
        Command::Bind { input, output } => cmd_bind(config_path, input, &output).await,
        Command::Run {
            acquire,
            input,
            output,
        } => cmd_run(config_path, &acquire, input, &output).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path).await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// A token cancelled by the first Ctrl-C / SIGTERM.
///
/// Listeners are registered before this returns, ahead of any subprocess.
fn interrupt_token() -> CancellationToken {
    ShutdownSignal::install().into_token()
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(config_path: Option<&Path>, args: &AcquireArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let request = build_request(&config, args)?;
    let interrupt = interrupt_token();

    info!(url = %request.source, output = %request.output_root.display(), "fetching documentation tree");

    let outcome = Orchestrator::for_request(&request)
        .acquire(&request, interrupt.cancelled())
        .await?;

    match outcome {
        AcquisitionOutcome::Success { root } => {
            println!();
            println!("  Tree acquired: {}", root.display());
            println!();
            Ok(())
        }
        AcquisitionOutcome::Failure(e) => Err(eyre!(e).wrap_err("acquisition failed")),
        AcquisitionOutcome::Interrupted => Err(eyre!("acquisition interrupted")),
    }
}

async fn cmd_bind(
    config_path: Option<&Path>,
    input: Option<PathBuf>,
    output: &OutputArgs,
) -> Result<()> {
    let config = load_config(config_path)?;
    let input = match input {
        Some(dir) => dir,
        None => {
            let url = config.acquisition.source_url.as_deref().ok_or_else(|| {
                eyre!("no input directory: pass --input or set acquisition.source_url")
            })?;
            AcquisitionRequest::from_config(url, &config.acquisition)?.acquired_root()
        }
    };
    let bind_config = build_bind_config(&config, output);
    let sink = WkhtmltopdfSink::from_config(&bind_config.render);
    let interrupt = interrupt_token();
    let reporter = CliProgress::new();

    info!(input = %input.display(), "binding documentation tree");

    let result = tokio::select! {
        result = pipeline::bind(&input, &bind_config, &sink, &reporter) => result,
        () = interrupt.cancelled() => {
            warn!("interrupt received, abandoning bind");
            render::discard_partial(&bind_config.render, &bind_config.work_dir).await;
            Err(BinderError::Interrupted)
        }
    };
    reporter.finish();

    print_summary(&result?);
    Ok(())
}

async fn cmd_run(
    config_path: Option<&Path>,
    args: &AcquireArgs,
    input: Option<PathBuf>,
    output: &OutputArgs,
) -> Result<()> {
    let config = load_config(config_path)?;
    let request = build_request(&config, args)?;
    let bind_config = build_bind_config(&config, output);
    let sink = WkhtmltopdfSink::from_config(&bind_config.render);
    let interrupt = interrupt_token();
    let reporter = CliProgress::new();

    info!(url = %request.source, "running full pipeline");

    let result = pipeline::run(
        &request,
        input.as_deref(),
        &bind_config,
        &sink,
        &interrupt,
        &reporter,
    )
    .await;
    reporter.finish();

    let result = result?;
    println!();
    println!("  Acquired: {}", result.acquired_root.display());
    print_summary(&result.bind);
    Ok(())
}

async fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = init_config(config_path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Merge CLI overrides into the `[acquisition]` section and build a request.
fn build_request(config: &AppConfig, args: &AcquireArgs) -> Result<AcquisitionRequest> {
    let mut acquisition = config.acquisition.clone();
    if let Some(dir) = &args.output_dir {
        acquisition.output_dir = dir.clone();
    }
    if let Some(depth) = args.depth {
        acquisition.max_depth = depth;
    }
    if let Some(minutes) = args.timeout_minutes {
        acquisition.timeout_minutes = minutes;
    }
    if let Some(script) = &args.transform {
        acquisition.transform_script = Some(script.clone());
    }

    let url = args
        .url
        .as_deref()
        .or(acquisition.source_url.as_deref())
        .ok_or_else(|| eyre!("no source URL: pass one or set acquisition.source_url"))?;

    Ok(AcquisitionRequest::from_config(url, &acquisition)?)
}

/// Apply `--out` and `--title` to the bind configuration.
///
/// The combined markup is written next to the rendered document.
fn build_bind_config(config: &AppConfig, output: &OutputArgs) -> BindConfig {
    let mut bind = BindConfig::from_app(config, ".");
    if let Some(out) = &output.out {
        if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
            bind.work_dir = dir.to_path_buf();
        }
        if let Some(name) = out.file_name() {
            bind.render.output_file = name.to_string_lossy().into_owned();
        }
    }
    if let Some(title) = &output.title {
        bind.document.title = title.clone();
    }
    bind
}

fn print_summary(result: &BindResult) {
    println!();
    println!("  Document rendered successfully!");
    println!("  Output:   {}", result.artifact.artifact.display());
    println!("  Sections: {}", result.sections);
    if result.skipped > 0 {
        println!("  Skipped:  {}", result.skipped);
    }
    println!("  Size:     {} bytes", result.artifact.size_bytes);
    println!("  SHA-256:  {}", result.artifact.sha256);
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        match ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            Ok(style) => spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            ),
            Err(e) => warn!(error = %e, "invalid spinner template, using default"),
        }
        Self { spinner }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        if name == ACQUIRE_PHASE {
            // The retrieval program writes its own progress to the terminal.
            self.spinner.disable_steady_tick();
            self.spinner.println(format!("{name}..."));
            return;
        }
        self.spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner.set_message(name.to_string());
    }

    fn document_processed(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Sanitizing [{current}/{total}] {path}"));
    }

    fn done(&self, _result: &BindResult) {
        self.spinner.finish_and_clear();
    }
}
