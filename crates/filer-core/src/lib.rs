//! Filer Core Library
//!
//! Shared functionality for filing HSA receipts and invoices:
//! - Record parsing from year sheets (CSV workbook)
//! - Canonical folder paths and filenames computed from each record
//! - Pluggable file stores (local directory tree, in-memory for tests)
//! - Upload, change-notification and refresh entry points
//! - Layered TOML configuration

pub mod config;
pub mod error;
pub mod models;
pub mod naming;
pub mod organizer;
pub mod pipeline;
pub mod sheets;
pub mod store;

/// Test utilities including an in-memory file store and workbook
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Config, ServerSettings, SheetsConfig, StoreConfig};
pub use error::{Error, Result};
pub use models::{
    CellRange, Column, EditEvent, FileCategory, PayoutStatus, Record, RecordContext,
    RefreshSummary, Selection, UploadRequest, UploadResponse,
};
pub use organizer::{FileOrganizer, FolderPath};
pub use pipeline::{is_year_sheet, Filer, FilingPlan};
pub use sheets::{CsvWorkbook, RecordStore, Workbook};
pub use store::{FileId, FileStore, FolderId, LocalFileStore, StoredFile};
