//! Filer CLI - HSA receipt and invoice filer
//!
//! Usage:
//!   filer init --year 2024                       Create store and workbook
//!   filer upload --sheet 2024 --row 2 --file x   File a document for a row
//!   filer edit --sheet 2024 --row 2 --column 8   Reconcile after an edit
//!   filer refresh 2024                           Re-file a whole sheet
//!   filer serve --port 3000                      Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.store.as_deref(),
        cli.workbook.as_deref(),
    )?;

    match cli.command {
        Commands::Init { year } => commands::cmd_init(&config, year),
        Commands::Upload {
            sheet,
            row,
            file,
            category,
            mime,
        } => commands::cmd_upload(&config, &sheet, row, &file, category.into(), mime.as_deref()),
        Commands::Edit {
            sheet,
            row,
            column,
            rows,
            columns,
        } => commands::cmd_edit(&config, &sheet, row, column, rows, columns),
        Commands::Show { sheet, row, json } => commands::cmd_show(&config, &sheet, row, json),
        Commands::Files { sheet, row } => commands::cmd_files(&config, &sheet, row),
        Commands::Refresh { sheet } => commands::cmd_refresh(&config, &sheet),
        Commands::Serve { port, host } => {
            commands::cmd_serve(config, host.as_deref(), port).await
        }
    }
}
