//! Application configuration for docbinder.
//!
//! User config lives at `~/.docbinder/docbinder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BinderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docbinder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docbinder";

// ---------------------------------------------------------------------------
// Config structs (matching docbinder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote retrieval settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Local tree discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Aggregated document settings.
    #[serde(default)]
    pub document: DocumentConfig,

    /// Render sink and page layout settings.
    #[serde(default)]
    pub render: RenderConfig,
}

/// `[acquisition]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Remote document tree to mirror. Usually given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Directory the retrieval process runs in and writes to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Recursion depth limit passed to the retrieval process.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Seconds to wait between requests.
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u32,

    /// Transfer rate cap, in the retrieval tool's notation (e.g. `200k`).
    #[serde(default = "default_rate_limit")]
    pub rate_limit: String,

    /// Deadline for retrieval plus transform, in minutes.
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,

    /// Path prefixes to restrict retrieval to. Empty means the source URL's path.
    #[serde(default)]
    pub include_directories: Vec<String>,

    /// Path prefixes excluded from retrieval.
    #[serde(default)]
    pub exclude_directories: Vec<String>,

    /// File name patterns the retrieval process rejects.
    #[serde(default)]
    pub reject_patterns: Vec<String>,

    /// Retrieval executable.
    #[serde(default = "default_retrieval_program")]
    pub retrieval_program: String,

    /// Script run against the acquired root after a successful retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_script: Option<String>,

    /// Interpreter the transform script is run with.
    #[serde(default = "default_transform_interpreter")]
    pub transform_interpreter: String,

    /// Seconds a terminated process gets to exit before it is killed.
    #[serde(default = "default_termination_grace_secs")]
    pub termination_grace_secs: u64,

    /// File name suffixes that mark partial transfers.
    #[serde(default = "default_partial_suffixes")]
    pub partial_suffixes: Vec<String>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            output_dir: default_output_dir(),
            max_depth: default_max_depth(),
            wait_seconds: default_wait_seconds(),
            rate_limit: default_rate_limit(),
            timeout_minutes: default_timeout_minutes(),
            include_directories: Vec::new(),
            exclude_directories: Vec::new(),
            reject_patterns: Vec::new(),
            retrieval_program: default_retrieval_program(),
            transform_script: None,
            transform_interpreter: default_transform_interpreter(),
            termination_grace_secs: default_termination_grace_secs(),
            partial_suffixes: default_partial_suffixes(),
        }
    }
}

fn default_output_dir() -> String {
    "./docs-mirror".into()
}
fn default_max_depth() -> u32 {
    3
}
fn default_wait_seconds() -> u32 {
    1
}
fn default_rate_limit() -> String {
    "200k".into()
}
fn default_timeout_minutes() -> u64 {
    30
}
fn default_retrieval_program() -> String {
    "wget".into()
}
fn default_transform_interpreter() -> String {
    "bash".into()
}
fn default_termination_grace_secs() -> u64 {
    10
}
fn default_partial_suffixes() -> Vec<String> {
    vec![".tmp".into(), ".wget".into()]
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Content-bearing file extensions, matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File stem of the document that represents its directory.
    #[serde(default = "default_index_stem")]
    pub index_stem: String,

    /// Stop descending into a directory once its index document is found.
    #[serde(default = "default_true")]
    pub collapse_indexed_dirs: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            index_stem: default_index_stem(),
            collapse_indexed_dirs: true,
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["html".into(), "htm".into()]
}
fn default_index_stem() -> String {
    "index".into()
}
fn default_true() -> bool {
    true
}

/// `[document]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Title of the aggregated document.
    #[serde(default = "default_title")]
    pub title: String,

    /// Heading above the table of contents.
    #[serde(default = "default_toc_heading")]
    pub toc_heading: String,

    /// Maximum documents read and sanitized at once.
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            toc_heading: default_toc_heading(),
            read_concurrency: default_read_concurrency(),
        }
    }
}

fn default_title() -> String {
    "Documentation".into()
}
fn default_toc_heading() -> String {
    "Table of Contents".into()
}
fn default_read_concurrency() -> usize {
    8
}

/// Page orientation understood by the render sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Portrait => f.write_str("Portrait"),
            Self::Landscape => f.write_str("Landscape"),
        }
    }
}

/// `[render]` section: the render sink plus its page layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Render sink executable.
    #[serde(default = "default_render_program")]
    pub program: String,

    /// Final artifact file name, relative to the working directory.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Transient combined-markup file name.
    #[serde(default = "default_combined_file")]
    pub combined_file: String,

    #[serde(default = "default_dpi")]
    pub dpi: u32,

    #[serde(default)]
    pub orientation: Orientation,

    #[serde(default = "default_page_size")]
    pub page_size: String,

    /// Footer text; `[page]` and `[toPage]` are substituted by the sink.
    #[serde(default = "default_footer_template")]
    pub footer_template: String,

    #[serde(default = "default_true")]
    pub enable_local_file_access: bool,

    /// Keep rendering when sub-resources (images, stylesheets) fail to load.
    #[serde(default = "default_true")]
    pub ignore_load_errors: bool,

    /// Page margins in millimetres.
    #[serde(default)]
    pub margins: Margins,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: default_render_program(),
            output_file: default_output_file(),
            combined_file: default_combined_file(),
            dpi: default_dpi(),
            orientation: Orientation::default(),
            page_size: default_page_size(),
            footer_template: default_footer_template(),
            enable_local_file_access: true,
            ignore_load_errors: true,
            margins: Margins::default(),
        }
    }
}

fn default_render_program() -> String {
    "wkhtmltopdf".into()
}
fn default_output_file() -> String {
    "documentation.pdf".into()
}
fn default_combined_file() -> String {
    "combined.html".into()
}
fn default_dpi() -> u32 {
    96
}
fn default_page_size() -> String {
    "A4".into()
}
fn default_footer_template() -> String {
    "[page]/[toPage]".into()
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    #[serde(default = "default_margin")]
    pub top: u32,
    #[serde(default = "default_margin")]
    pub bottom: u32,
    #[serde(default = "default_margin")]
    pub left: u32,
    #[serde(default = "default_margin")]
    pub right: u32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: default_margin(),
            bottom: default_margin(),
            left: default_margin(),
            right: default_margin(),
        }
    }
}

fn default_margin() -> u32 {
    20
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docbinder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| BinderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docbinder/docbinder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config.
///
/// An explicit path must exist. Without one, the default location is used and
/// a missing file yields defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BinderError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BinderError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file, to `target` or the default location.
/// Returns the path to the created file.
pub fn init_config(target: Option<&Path>) -> Result<PathBuf> {
    let path = match target {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| BinderError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| BinderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BinderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("wkhtmltopdf"));
        assert!(toml_str.contains("[render.margins]"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.acquisition.max_depth, 3);
        assert_eq!(parsed.acquisition.partial_suffixes, vec![".tmp", ".wget"]);
        assert_eq!(parsed.render.orientation, Orientation::Portrait);
        assert_eq!(parsed.render.margins.left, 20);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let toml_str = r#"
[acquisition]
source_url = "https://example.com/en/docs"
exclude_directories = ["/en/blog"]

[render]
orientation = "landscape"

[render.margins]
top = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(
            config.acquisition.source_url.as_deref(),
            Some("https://example.com/en/docs")
        );
        assert_eq!(config.acquisition.rate_limit, "200k");
        assert_eq!(config.render.orientation, Orientation::Landscape);
        assert_eq!(config.render.margins.top, 5);
        assert_eq!(config.render.margins.bottom, 20);
        assert_eq!(config.discovery.index_stem, "index");
        assert!(config.discovery.collapse_indexed_dirs);
    }

    #[test]
    fn init_then_load_explicit_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("docbinder.toml");

        let written = init_config(Some(&path)).expect("init");
        assert_eq!(written, path);

        let loaded = load_config(Some(&path)).expect("load");
        assert_eq!(loaded.document.title, "Documentation");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_config(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(BinderError::Io { .. })));
    }

    #[test]
    fn orientation_displays_for_sink() {
        assert_eq!(Orientation::Portrait.to_string(), "Portrait");
        assert_eq!(Orientation::Landscape.to_string(), "Landscape");
    }
}
