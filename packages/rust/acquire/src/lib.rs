//! Remote tree acquisition: process running, retrieval, cleanup.
//!
//! This crate provides:
//! - [`process`] — external process runner with deadline and cooperative cancellation
//! - [`retrieval`] — argument contract for the retrieval and transform subprocesses
//! - [`orchestrator`] — races the acquisition against an interrupt and cleans up
//! - [`cleanup`] — best-effort partial artifact removal
//! - [`ShutdownSignal`] — the external interrupt listener

pub mod cleanup;
pub mod orchestrator;
pub mod process;
pub mod retrieval;
mod signal;

pub use cleanup::{CleanupReport, is_partial_artifact, remove_partial_artifacts};
pub use orchestrator::Orchestrator;
pub use process::{CommandSpec, ProcessRunner};
pub use retrieval::{retrieval_args, retrieval_command, transform_command};
pub use signal::ShutdownSignal;
