//! Record access on top of a tabular workbook
//!
//! A workbook is a set of named sheets. Each year sheet holds one record per
//! row in a fixed 8-column layout (see [`Column`]); row 1 is the header.
//!
//! - `Workbook` trait abstracts the tabular source
//! - `CsvWorkbook` keeps each sheet as `<sheet>.csv` in a directory
//! - `RecordStore` turns rows into typed records and writes the uploaded flag

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Column, Record, RecordContext, Selection};

mod csv_workbook;

pub use csv_workbook::CsvWorkbook;

/// Trait for tabular record sources
pub trait Workbook: Send + Sync {
    /// Whether a sheet with this name exists
    fn has_sheet(&self, sheet: &str) -> Result<bool>;

    /// Cells of a 1-based row; rows past the end read as empty
    fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<String>>;

    /// Every row of a sheet, header included
    fn read_sheet(&self, sheet: &str) -> Result<Vec<Vec<String>>>;

    /// Number of rows in a sheet, header included
    fn row_count(&self, sheet: &str) -> Result<usize>;

    /// Overwrite one cell (1-based row, 0-based column)
    fn write_cell(&self, sheet: &str, row: usize, column: usize, value: &str) -> Result<()>;

    /// The row the user is focused on, if any
    fn active_selection(&self) -> Option<Selection>;
}

/// Typed record access for one workbook
pub struct RecordStore<W: Workbook> {
    workbook: W,
    excluded_sheets: Vec<String>,
}

impl<W: Workbook> RecordStore<W> {
    pub fn new(workbook: W, excluded_sheets: Vec<String>) -> Self {
        Self {
            workbook,
            excluded_sheets,
        }
    }

    pub fn workbook(&self) -> &W {
        &self.workbook
    }

    pub fn is_excluded(&self, sheet: &str) -> bool {
        self.excluded_sheets.iter().any(|s| s == sheet)
    }

    pub fn row_count(&self, sheet: &str) -> Result<usize> {
        self.workbook.row_count(sheet)
    }

    /// Read the record on a row
    ///
    /// Returns `None` for a blank row (empty payment date).
    pub fn get_record(&self, sheet: &str, row_index: usize) -> Result<Option<Record>> {
        if !self.workbook.has_sheet(sheet)? {
            return Err(Error::SheetNotFound(sheet.to_string()));
        }

        let cells = self.workbook.read_row(sheet, row_index)?;
        parse_record(&cells, row_index)
    }

    /// Read every data row of a sheet in one pass
    ///
    /// Rows are parsed independently, so a bad row does not hide the rest.
    pub fn get_records(&self, sheet: &str) -> Result<Vec<(usize, Result<Option<Record>>)>> {
        let rows = self.workbook.read_sheet(sheet)?;
        Ok(rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, cells)| (i + 1, parse_record(cells, i + 1)))
            .collect())
    }

    /// Write the "receipt uploaded" cell as Yes/No
    pub fn set_uploaded_flag(&self, sheet: &str, row_index: usize, value: bool) -> Result<()> {
        if !self.workbook.has_sheet(sheet)? {
            return Err(Error::SheetNotFound(sheet.to_string()));
        }

        let text = if value { "Yes" } else { "No" };
        self.workbook
            .write_cell(sheet, row_index, Column::ReceiptUploaded.index(), text)?;

        info!(sheet, row = row_index, "Marked receipt uploaded: {}", text);
        Ok(())
    }

    /// Resolve the record under the user's current selection
    ///
    /// Returns `None` without a selection, on the header row, or on an
    /// excluded sheet. A row that fails to load yields a context without a
    /// record.
    pub fn get_active_record_context(&self) -> Option<RecordContext> {
        let Some(selection) = self.workbook.active_selection() else {
            debug!("No active selection");
            return None;
        };

        if selection.row <= 1 || self.is_excluded(&selection.sheet) {
            debug!(
                sheet = %selection.sheet,
                row = selection.row,
                "Skipping header row or excluded sheet"
            );
            return None;
        }

        let record = match self.get_record(&selection.sheet, selection.row) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    sheet = %selection.sheet,
                    row = selection.row,
                    "Failed to read active row: {}",
                    e
                );
                None
            }
        };

        Some(RecordContext {
            sheet: selection.sheet,
            row_index: selection.row,
            record,
        })
    }
}

/// Build a record from the 8 cells of a row
pub fn parse_record(cells: &[String], row_index: usize) -> Result<Option<Record>> {
    let cell = |column: Column| cells.get(column.index()).map(String::as_str).unwrap_or("");

    let date = cell(Column::PaymentDate);
    if date.trim().is_empty() {
        return Ok(None);
    }

    let payment_date = parse_date(date)
        .map_err(|e| Error::InvalidData(format!("Row {}: {}", row_index, e)))?;

    let cost = match parse_cost(cell(Column::Cost)) {
        Some(cost) => cost,
        None => {
            warn!(row = row_index, "Unparseable cost {:?}, using 0", cell(Column::Cost));
            0.0
        }
    };

    Ok(Some(Record {
        payment_date,
        patient: cell(Column::Patient).to_string(),
        service: cell(Column::Service).to_string(),
        cost,
        company: cell(Column::Company).to_string(),
        hsa_approved: parse_bool(cell(Column::HsaApproved)),
        receipt_uploaded: parse_bool(cell(Column::ReceiptUploaded)),
        paid_out: parse_bool(cell(Column::PaidOut)),
        row_index,
    }))
}

/// Parse a date cell
///
/// Accepts spreadsheet-style dates and RFC 3339 timestamps (date taken in
/// the timestamp's own offset).
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    // Try common date formats
    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%y", // 01/15/24 (before %Y, which would read "24" as year 24)
        "%m/%d/%Y", // 01/15/2024
        "%m-%d-%Y", // 01-15-2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    Err(Error::InvalidData(format!("Unable to parse date: {}", s)))
}

/// Parse a cost cell, handling currency symbols and thousands separators
///
/// An empty cell is zero; anything unparseable is `None`.
pub fn parse_cost(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().replace(['$', ',', ' '], "");
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok()
}

/// "yes" / "true" in any case are true; everything else is false
pub fn parse_bool(s: &str) -> bool {
    let s = s.trim().to_lowercase();
    s == "yes" || s == "true"
}
