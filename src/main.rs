mod cli;
mod command;
mod error;
mod model;
mod orchestrator;
mod resolver;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

// One cooperative scheduler drives the controller and every run it supervises.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.is_headless() || cfg!(not(feature = "tui"));

    let code = cli::run(args).await?;
    // Headless modes mirror the copy's outcome in the process exit code.
    if is_headless {
        std::process::exit(code);
    }
    Ok(())
}
