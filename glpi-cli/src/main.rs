mod api;
mod batch;
mod cli;
mod config;
mod provision;
mod sheet;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => cli::commands::run::handle_run_command(args).await,
    }
}
