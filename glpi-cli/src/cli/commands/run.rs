//! The `run` command: read the workbook, provision every row, write the
//! status copy, print the totals.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use colored::*;
use std::path::PathBuf;

use crate::api::GlpiClient;
use crate::batch::run_batch;
use crate::config::Config;
use crate::provision::{Context, Defaults};
use crate::sheet::{read_input_sheet, write_status_sheet};

#[derive(Args)]
pub struct RunArgs {
    /// Input workbook (falls back to the configured file path)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Config file instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write the status-annotated workbook
    /// (default: `<input>_status.xlsx`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

pub async fn handle_run_command(args: RunArgs) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(args.config.as_deref())?;

    let Some(input) = args.file.or_else(|| config.file.clone()) else {
        bail!("no input file: pass --file or configure FILE_PATH");
    };
    if !input.exists() {
        bail!("input file does not exist: {}", input.display());
    }

    let sheet = read_input_sheet(&input)?;
    if sheet.rows.is_empty() {
        bail!("workbook '{}' has no data rows", input.display());
    }
    println!(
        "{} rows to process from {}",
        sheet.rows.len().to_string().bright_green().bold(),
        input.display().to_string().cyan()
    );

    let client = GlpiClient::new(config.credentials.clone());
    let session = client
        .open_session()
        .await
        .context("could not open a GLPI session")?;

    let ctx = Context::new(
        client.clone(),
        session.clone(),
        config.retry.clone(),
        Defaults {
            group_id: config.group_id,
            profile_id: config.profile_id,
        },
    );

    let (statuses, stats) = run_batch(&ctx, &sheet.rows).await;

    client.close_session(&session).await;

    let output = args.output.unwrap_or_else(|| status_path(&input));
    write_status_sheet(&output, &sheet, &statuses)
        .with_context(|| format!("failed to write the status workbook to {}", output.display()))?;
    println!("status written to {}", output.display().to_string().cyan());

    println!();
    println!("processed: {}", stats.processed.to_string().cyan());
    println!("succeeded: {}", stats.succeeded.to_string().green());
    println!("failed:    {}", stats.failed.to_string().red());
    if stats.processed > 0 {
        println!("success rate: {:.1}%", stats.success_rate());
    }

    if stats.failed > 0 {
        println!(
            "{}",
            "some rows failed; see the status columns for the specific reasons".yellow()
        );
    }

    Ok(())
}

/// `input.xlsx` -> `input_status.xlsx`, next to the input.
fn status_path(input: &std::path::Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_status.xlsx"))
}
