//! docbinder CLI: bind a documentation site into a single ordered document.
//!
//! Crawls a site within its domain, extracts the substantive content of each
//! page, and assembles everything into one readable file with a table of
//! contents and embedded images.

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
