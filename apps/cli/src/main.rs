//! docbinder CLI: mirror a documentation site and bind it into one PDF.
//!
//! Acquires a remote tree with an external retrieval program, then sanitizes,
//! names, and aggregates its documents and renders them through an external
//! renderer.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
