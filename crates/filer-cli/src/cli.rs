//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use filer_core::FileCategory;

/// Filer - File HSA receipts and invoices from your expense sheets
#[derive(Parser)]
#[command(name = "filer")]
#[command(
    about = "Files HSA receipts and invoices into folders derived from spreadsheet rows",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory acting as the file store root (overrides config)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Directory of <year>.csv sheets (overrides config)
    #[arg(long, global = true)]
    pub workbook: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Document kind, as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Receipt,
    Invoice,
}

impl From<CategoryArg> for FileCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Receipt => FileCategory::Receipt,
            CategoryArg::Invoice => FileCategory::Invoice,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the store and workbook directories
    Init {
        /// Also create an empty sheet for this year
        #[arg(long)]
        year: Option<u16>,
    },

    /// Upload a document for a row
    Upload {
        /// Year sheet holding the row
        #[arg(short, long)]
        sheet: String,

        /// Row number (row 1 is the header)
        #[arg(short, long)]
        row: usize,

        /// File to upload
        #[arg(short, long)]
        file: PathBuf,

        /// Document kind
        #[arg(short, long, value_enum, default_value = "receipt")]
        category: CategoryArg,

        /// MIME type (guessed from the extension if not specified)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Reconcile files after cells were edited
    Edit {
        /// Sheet that was edited
        #[arg(short, long)]
        sheet: String,

        /// First edited row
        #[arg(short, long)]
        row: usize,

        /// First edited column (1-based; 8 is "Paid Out")
        #[arg(short, long)]
        column: usize,

        /// Number of edited rows
        #[arg(long, default_value = "1")]
        rows: usize,

        /// Number of edited columns
        #[arg(long, default_value = "1")]
        columns: usize,
    },

    /// Show a row's record and where its documents go
    Show {
        #[arg(short, long)]
        sheet: String,

        #[arg(short, long)]
        row: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the documents filed for a row
    Files {
        #[arg(short, long)]
        sheet: String,

        #[arg(short, long)]
        row: usize,
    },

    /// Move and rename every document of a year sheet into place
    Refresh {
        /// Year sheet to refresh
        sheet: String,
    },

    /// Start the web server
    Serve {
        /// Port to listen on (defaults to config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to config)
        #[arg(long)]
        host: Option<String>,
    },
}
