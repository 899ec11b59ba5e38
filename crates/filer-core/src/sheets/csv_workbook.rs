//! Workbook stored as a directory of CSV files

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::Workbook;
use crate::error::{Error, Result};
use crate::models::{Column, Selection};

/// One `<sheet>.csv` per sheet; row 1 of each file is the header
pub struct CsvWorkbook {
    dir: PathBuf,
    selection: Option<Selection>,
}

impl CsvWorkbook {
    /// Open a workbook directory (it must exist)
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::NotFound(format!(
                "Workbook directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            selection: None,
        })
    }

    /// Attach the row the caller is focused on
    pub fn with_selection(mut self, selection: Option<Selection>) -> Self {
        self.selection = selection;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of all sheets, sorted
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create a sheet holding only the header row
    ///
    /// Returns `false` when the sheet already exists.
    pub fn create_sheet(&self, sheet: &str) -> Result<bool> {
        if self.has_sheet(sheet)? {
            return Ok(false);
        }

        let header: Vec<String> = Column::HEADERS.iter().map(|h| h.to_string()).collect();
        self.write_rows(sheet, &[header])?;
        info!(sheet, "Created sheet");
        Ok(true)
    }

    fn sheet_path(&self, sheet: &str) -> Result<PathBuf> {
        if sheet.is_empty() || sheet.contains(['/', '\\']) || sheet.starts_with('.') {
            return Err(Error::InvalidData(format!("Invalid sheet name: {:?}", sheet)));
        }
        Ok(self.dir.join(format!("{}.csv", sheet)))
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        let path = self.sheet_path(sheet)?;
        if !path.is_file() {
            return Err(Error::SheetNotFound(sheet.to_string()));
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(File::open(&path)?));

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    /// Rewrite a sheet via a temp file in the same directory
    fn write_rows(&self, sheet: &str, rows: &[Vec<String>]) -> Result<()> {
        let path = self.sheet_path(sheet)?;
        let temp = NamedTempFile::new_in(&self.dir)?;

        {
            let mut wtr = WriterBuilder::new().flexible(true).from_writer(temp.as_file());
            for row in rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
        }

        temp.persist(&path)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl Workbook for CsvWorkbook {
    fn has_sheet(&self, sheet: &str) -> Result<bool> {
        Ok(self.sheet_path(sheet)?.is_file())
    }

    fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<String>> {
        let rows = self.read_rows(sheet)?;
        Ok(row
            .checked_sub(1)
            .and_then(|i| rows.get(i))
            .cloned()
            .unwrap_or_default())
    }

    fn read_sheet(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        self.read_rows(sheet)
    }

    fn row_count(&self, sheet: &str) -> Result<usize> {
        Ok(self.read_rows(sheet)?.len())
    }

    fn write_cell(&self, sheet: &str, row: usize, column: usize, value: &str) -> Result<()> {
        if row == 0 {
            return Err(Error::InvalidData("Rows are numbered from 1".to_string()));
        }

        let mut rows = self.read_rows(sheet)?;
        if rows.len() < row {
            rows.resize(row, Vec::new());
        }

        let cells = &mut rows[row - 1];
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        cells[column] = value.to_string();

        self.write_rows(sheet, &rows)?;
        debug!(sheet, row, column, "Wrote cell");
        Ok(())
    }

    fn active_selection(&self) -> Option<Selection> {
        self.selection.clone()
    }
}
