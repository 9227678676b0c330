mod bridge;
mod cli;
mod engine;
mod format;
mod logging;
mod model;
mod orchestrator;
mod paths;
mod presentation;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match cli::run(args).await {
        Ok(true) => Ok(()),
        // Job or save failed; details were already printed.
        Ok(false) => std::process::exit(1),
        Err(e) => Err(e),
    }
}
