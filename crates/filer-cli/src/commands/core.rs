//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_config` - Resolve config and apply command-line overrides
//! - `open_filer` - Shared utility to build a filer from config
//! - `cmd_init` - Create the store and workbook directories

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use filer_core::{Config, CsvWorkbook, Filer, LocalFileStore, Selection};
use tracing::debug;

/// Filer over the local store and CSV workbook
pub type LocalFiler = Filer<LocalFileStore, CsvWorkbook>;

/// Load config, then let `--store` / `--workbook` win over it
pub fn load_config(
    config_path: Option<&Path>,
    store: Option<&Path>,
    workbook: Option<&Path>,
) -> Result<Config> {
    let mut config = Config::load(config_path).context("Failed to load config")?;

    if let Some(store) = store {
        config.store.root_dir = store.to_path_buf();
    }
    if let Some(workbook) = workbook {
        config.sheets.workbook_dir = workbook.to_path_buf();
    }

    debug!(
        store = %config.store.root_dir.display(),
        workbook = %config.sheets.workbook_dir.display(),
        "Loaded config"
    );
    Ok(config)
}

/// Open the store and workbook named by the config
pub fn open_filer(config: &Config, selection: Option<Selection>) -> Result<LocalFiler> {
    Filer::open(config, selection).with_context(|| {
        format!(
            "Failed to open workbook {} (run 'filer init' first)",
            config.sheets.workbook_dir.display()
        )
    })
}

pub fn cmd_init(config: &Config, year: Option<u16>) -> Result<()> {
    println!("🔧 Initializing filer...");

    LocalFileStore::new(&config.store.root_dir).context("Failed to create store directory")?;
    println!("   Store: {}", config.store.root_dir.display());

    fs::create_dir_all(&config.sheets.workbook_dir).with_context(|| {
        format!(
            "Failed to create workbook directory {}",
            config.sheets.workbook_dir.display()
        )
    })?;
    println!("   Workbook: {}", config.sheets.workbook_dir.display());

    if let Some(year) = year {
        let workbook = CsvWorkbook::open(&config.sheets.workbook_dir)?;
        let sheet = year.to_string();
        if workbook.create_sheet(&sheet)? {
            println!("   Created sheet {}.csv", sheet);
        } else {
            println!("   Sheet {}.csv already exists", sheet);
        }
    }

    println!("✅ Filer initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add rows to a year sheet (e.g. 2024.csv)");
    println!("  2. Upload a receipt: filer upload --sheet 2024 --row 2 --file receipt.pdf");
    println!("  3. Start web API: filer serve");

    Ok(())
}
