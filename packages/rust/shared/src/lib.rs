//! Shared types, error model, and configuration for docbinder.
//!
//! This crate is the foundation depended on by all other docbinder crates.
//! It provides:
//! - [`BinderError`] — the unified error type
//! - Domain types ([`AcquisitionRequest`], [`AcquisitionOutcome`], [`DiscoveredDocument`], [`Section`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AcquisitionConfig, AppConfig, DiscoveryConfig, DocumentConfig, Margins, Orientation,
    RenderConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{BinderError, Result};
pub use types::{AcquisitionOutcome, AcquisitionRequest, DiscoveredDocument, Section, TransformStep};
