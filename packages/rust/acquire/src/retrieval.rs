//! Argument contract for the retrieval and transform subprocesses.

use std::path::Path;

use docbinder_shared::{AcquisitionRequest, TransformStep};

use crate::process::CommandSpec;

/// Flags that are always passed to the retrieval process.
const FIXED_FLAGS: &[&str] = &[
    "--recursive",
    "--no-clobber",
    "--page-requisites",
    "--html-extension",
    "--convert-links",
    "--restrict-file-names=windows",
];

/// Build the retrieval argument list for `request`.
///
/// Recursive mirroring with page requisites, `.html` normalization and local
/// link rewriting, restricted to the source host and the configured path
/// prefixes. The source URL is always the last argument.
pub fn retrieval_args(request: &AcquisitionRequest) -> Vec<String> {
    let mut args: Vec<String> = FIXED_FLAGS.iter().map(|f| (*f).to_string()).collect();

    args.push("--domains".into());
    args.push(request.domain().to_string());
    args.push("--no-parent".into());

    if !request.include_directories.is_empty() {
        args.push(format!(
            "--include-directories={}",
            request.include_directories.join(",")
        ));
    }
    if !request.exclude_directories.is_empty() {
        args.push(format!(
            "--exclude-directories={}",
            request.exclude_directories.join(",")
        ));
    }
    if !request.reject_patterns.is_empty() {
        args.push(format!("--reject={}", request.reject_patterns.join(",")));
    }

    args.push(format!("--wait={}", request.wait.as_secs()));
    args.push(format!("--limit-rate={}", request.rate_limit));
    args.push(format!("--level={}", request.max_depth));
    args.push(request.source.to_string());

    args
}

/// The retrieval command, run inside the output root.
pub fn retrieval_command(request: &AcquisitionRequest) -> CommandSpec {
    CommandSpec::new(&request.retrieval_program)
        .args(retrieval_args(request))
        .current_dir(&request.output_root)
}

/// The post-acquisition transform: `<interpreter> <script> <root>`.
pub fn transform_command(step: &TransformStep, root: &Path) -> CommandSpec {
    CommandSpec::new(&step.interpreter)
        .arg(step.script.to_string_lossy())
        .arg(root.to_string_lossy())
}
