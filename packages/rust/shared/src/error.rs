//! Error types for docbinder.
//!
//! Library crates use [`BinderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all docbinder operations.
#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    /// Configuration loading or validation error (e.g. unwritable output root).
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external program could not be started (missing binary, bad cwd).
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// An external program exited unsuccessfully.
    #[error("`{program}` exited with {}", describe_code(*.code))]
    ProcessFailed { program: String, code: Option<i32> },

    /// An external program was still running when the deadline expired.
    #[error("`{program}` exceeded its deadline after {after:?}")]
    DeadlineExceeded { program: String, after: Duration },

    /// The run was interrupted by an external termination request.
    #[error("interrupted")]
    Interrupted,

    /// Markup parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The render sink failed to produce an artifact.
    #[error("render error: {0}")]
    Render(String),

    /// Discovery finished without a single content document.
    #[error("no documents found under {root:?}")]
    NoDocuments { root: PathBuf },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BinderError>;

impl BinderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a spawn failure with the program name.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Whether this error was caused by an external interrupt rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
