//! Command-line surface

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "glpi-cli",
    about = "Bulk-provision GLPI entities, users and assets from a spreadsheet",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process an input workbook against the GLPI API
    Run(commands::run::RunArgs),
}
