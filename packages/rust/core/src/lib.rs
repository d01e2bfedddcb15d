//! Core pipeline orchestration and domain logic for docbinder.
//!
//! This crate ties together acquisition, discovery, sanitization, section
//! naming, aggregation, and rendering into end-to-end workflows
//! ([`pipeline::bind`] and [`pipeline::run`]).

pub mod assembler;
pub mod pipeline;
pub mod render;
pub mod toc;

pub use assembler::{AggregatedDocument, AssembleOptions, aggregate};
pub use pipeline::{
    ACQUIRE_PHASE, BindConfig, BindResult, ProgressReporter, RunResult, SilentProgress, bind, run,
};
pub use render::{RenderResult, RenderSink, WkhtmltopdfSink, dispatch};
pub use toc::{TITLE_DELIMITER, derive_title, section_title};
