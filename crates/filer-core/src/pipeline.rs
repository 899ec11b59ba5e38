//! Entry points: upload, change notification, and refresh
//!
//! Each entry point owns its recovery rules. Uploads turn any failure into an
//! unsuccessful [`UploadResponse`]. Change notifications never fail; errors are
//! logged per file, per row, and once more at the outer boundary. Refresh
//! counts failures in its summary.

use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    Column, EditEvent, FileCategory, RecordContext, RefreshSummary, Selection, UploadRequest,
    UploadResponse,
};
use crate::naming;
use crate::organizer::{folder_segments, FileOrganizer};
use crate::sheets::{CsvWorkbook, RecordStore, Workbook};
use crate::store::{path_parts, FileStore, LocalFileStore, StoredFile};

/// Sheets holding records are named after their year
static YEAR_SHEET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

pub fn is_year_sheet(sheet: &str) -> bool {
    YEAR_SHEET.is_match(sheet)
}

/// Where a record's documents go, computed without touching the store
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingPlan {
    pub category: FileCategory,
    /// Folder path below the root, base path included
    pub folder: String,
    /// Filename with a placeholder extension
    pub filename: String,
}

/// File store and workbook wired together for one invocation
pub struct Filer<S: FileStore, W: Workbook> {
    organizer: FileOrganizer<S>,
    records: RecordStore<W>,
}

impl Filer<LocalFileStore, CsvWorkbook> {
    /// Build the on-disk collaborators described by a config
    pub fn open(config: &Config, selection: Option<Selection>) -> Result<Self> {
        let store = LocalFileStore::new(&config.store.root_dir)?;
        let workbook = CsvWorkbook::open(&config.sheets.workbook_dir)?.with_selection(selection);

        Ok(Self::new(
            FileOrganizer::new(store, config.store.clone()),
            RecordStore::new(workbook, config.sheets.excluded_sheets.clone()),
        ))
    }
}

impl<S: FileStore, W: Workbook> Filer<S, W> {
    pub fn new(organizer: FileOrganizer<S>, records: RecordStore<W>) -> Self {
        Self { organizer, records }
    }

    pub fn organizer(&self) -> &FileOrganizer<S> {
        &self.organizer
    }

    pub fn records(&self) -> &RecordStore<W> {
        &self.records
    }

    /// Store an uploaded document and mark its row
    ///
    /// Never fails; the response carries the outcome.
    pub fn handle_upload(&self, request: &UploadRequest) -> UploadResponse {
        match self.upload(request) {
            Ok(file) => UploadResponse {
                success: true,
                file_id: file.id.to_string(),
                message: format!("File uploaded successfully as {}", file.name),
            },
            Err(e) => {
                error!(
                    sheet = %request.sheet,
                    row = request.record.row_index,
                    "Upload failed: {}",
                    e
                );
                UploadResponse {
                    success: false,
                    file_id: String::new(),
                    message: format!("Upload failed: {}", e),
                }
            }
        }
    }

    fn upload(&self, request: &UploadRequest) -> Result<StoredFile> {
        let bytes = STANDARD.decode(request.content.trim())?;
        if bytes.is_empty() {
            return Err(Error::InvalidData("Uploaded file is empty".to_string()));
        }

        let file = self.organizer.upload(
            &bytes,
            &request.mime_type,
            &request.filename,
            &request.record,
            request.category,
        )?;

        self.records
            .set_uploaded_flag(&request.sheet, request.record.row_index, true)?;

        Ok(file)
    }

    /// React to edited cells by moving and renaming the affected files
    ///
    /// Ignores edits outside year sheets, in the header row, or in columns
    /// that do not affect a file's location or name. Never fails.
    pub fn handle_edit(&self, event: &EditEvent) {
        if let Err(e) = self.try_handle_edit(event) {
            error!(sheet = %event.sheet, "Error handling edit: {}", e);
        }
    }

    fn try_handle_edit(&self, event: &EditEvent) -> Result<()> {
        let range = event.range;

        if !is_year_sheet(&event.sheet) || self.records.is_excluded(&event.sheet) {
            debug!(sheet = %event.sheet, "Ignoring edit outside a year sheet");
            return Ok(());
        }

        if !range.column_indices().any(Column::is_tracked) {
            debug!(
                sheet = %event.sheet,
                column = range.column,
                "Ignoring edit to untracked column"
            );
            return Ok(());
        }

        let paid_out_edited = range.touches(Column::PaidOut);
        let last_row = self.records.row_count(&event.sheet)?;

        let rows = range
            .rows()
            .skip_while(|row| *row < 2)
            .take_while(|row| *row <= last_row);

        for row in rows {
            if let Err(e) = self.reconcile_row(&event.sheet, row, paid_out_edited) {
                error!(sheet = %event.sheet, row, "Error reconciling row: {}", e);
            }
        }

        Ok(())
    }

    /// Reconcile every file of one edited row
    ///
    /// Only the payout flag can be reconstructed from an edit: when that
    /// column changed, the old record is the current one with the flag
    /// inverted. Other changes are picked up by renaming.
    fn reconcile_row(&self, sheet: &str, row: usize, paid_out_edited: bool) -> Result<()> {
        let Some(record) = self.records.get_record(sheet, row)? else {
            debug!(sheet, row, "Edited row is blank");
            return Ok(());
        };

        let files = self.organizer.find_files_for_record(&record)?;
        if files.is_empty() {
            debug!(sheet, row, "No files to reconcile");
            return Ok(());
        }

        let old_record = if paid_out_edited {
            record.with_paid_out(!record.paid_out)
        } else {
            record.clone()
        };

        for file in &files {
            let category = naming::category_from_filename(&file.name);
            if let Err(e) = self
                .organizer
                .reconcile(&old_record, &record, category, file)
            {
                error!(file = %file.id, "Error moving file {}: {}", file.name, e);
            }
        }

        Ok(())
    }

    /// Put every file of every row in a year sheet where it belongs
    ///
    /// Files are placed from where they actually sit, so this also repairs
    /// files that an earlier edit missed.
    pub fn refresh_sheet(&self, sheet: &str) -> Result<RefreshSummary> {
        if !is_year_sheet(sheet) || self.records.is_excluded(sheet) {
            return Err(Error::InvalidData(format!(
                "Sheet {} is not a year sheet",
                sheet
            )));
        }

        let mut summary = RefreshSummary::default();

        for (row, record) in self.records.get_records(sheet)? {
            summary.rows_scanned += 1;

            let record = match record {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(sheet, row, "Skipping row: {}", e);
                    summary.failures += 1;
                    continue;
                }
            };

            let files = match self.organizer.find_files_for_record(&record) {
                Ok(files) => files,
                Err(e) => {
                    warn!(sheet, row, "Could not search files: {}", e);
                    summary.failures += 1;
                    continue;
                }
            };

            for file in &files {
                summary.files_checked += 1;
                let category = naming::category_from_filename(&file.name);
                match self.organizer.place_file(&record, category, file) {
                    Ok((_, true)) => summary.files_updated += 1,
                    Ok((_, false)) => {}
                    Err(e) => {
                        error!(file = %file.id, "Error moving file {}: {}", file.name, e);
                        summary.failures += 1;
                    }
                }
            }
        }

        info!(
            sheet,
            rows = summary.rows_scanned,
            checked = summary.files_checked,
            updated = summary.files_updated,
            failures = summary.failures,
            "Refreshed file organization"
        );
        Ok(summary)
    }

    /// The record under the caller's selection
    pub fn active_context(&self) -> Option<RecordContext> {
        self.records.get_active_record_context()
    }

    /// Record on a given row; the header row and excluded sheets are rejected
    pub fn record_context(&self, sheet: &str, row: usize) -> Result<RecordContext> {
        if row <= 1 {
            return Err(Error::InvalidData("Row 1 is the header row".to_string()));
        }
        if self.records.is_excluded(sheet) {
            return Err(Error::InvalidData(format!("Sheet {} holds no records", sheet)));
        }

        Ok(RecordContext {
            sheet: sheet.to_string(),
            row_index: row,
            record: self.records.get_record(sheet, row)?,
        })
    }

    /// Where each category of the record's documents would be filed
    pub fn filing_plan(&self, context: &RecordContext) -> Vec<FilingPlan> {
        let Some(record) = &context.record else {
            return Vec::new();
        };

        let root: Vec<&str> = path_parts(&self.organizer.config().base_path).collect();

        FileCategory::ALL
            .into_iter()
            .map(|category| {
                let mut folder = root.join("/");
                for segment in folder_segments(record, category) {
                    folder.push('/');
                    folder.push_str(&segment);
                }
                FilingPlan {
                    category,
                    folder,
                    filename: self.organizer.compute_filename(record, category, "pdf"),
                }
            })
            .collect()
    }

    /// Files belonging to the record on a row
    pub fn files_for_row(&self, sheet: &str, row: usize) -> Result<Vec<StoredFile>> {
        match self.record_context(sheet, row)?.record {
            Some(record) => self.organizer.find_files_for_record(&record),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::models::{CellRange, Record};
    use crate::test_utils::{sample_record, MemoryFileStore, MemoryWorkbook, SHEET_HEADER};

    fn setup() -> Filer<MemoryFileStore, MemoryWorkbook> {
        let workbook = MemoryWorkbook::new();
        workbook.add_sheet(
            "2024",
            &[
                &SHEET_HEADER,
                &["2024-03-15", "Jane Doe", "X-Ray", "120", "Acme Health", "Yes", "No", "No"],
                &[
                    "2024-05-02",
                    "John Roe",
                    "Dental Cleaning",
                    "$85.00",
                    "Beta Clinic",
                    "Yes",
                    "No",
                    "No",
                ],
                &["", "", "", "", "", "", "", ""],
            ],
        );
        workbook.add_sheet("Totals", &[&["Year", "Total"]]);
        workbook.add_sheet("Notes", &[&SHEET_HEADER]);

        let config = StoreConfig {
            root_dir: "unused".into(),
            base_path: "financial/hsa-receipts".to_string(),
            alternate_root: None,
        };

        Filer::new(
            FileOrganizer::new(MemoryFileStore::new(), config),
            RecordStore::new(workbook, vec!["Totals".to_string()]),
        )
    }

    fn upload_request(record: Record, category: FileCategory) -> UploadRequest {
        UploadRequest {
            sheet: "2024".to_string(),
            filename: "scan.pdf".to_string(),
            content: STANDARD.encode(b"%PDF-1.4"),
            mime_type: "application/pdf".to_string(),
            record,
            category,
        }
    }

    fn edit(sheet: &str, row: usize, column: Column) -> EditEvent {
        EditEvent {
            sheet: sheet.to_string(),
            range: CellRange::single(row, column.index() + 1),
        }
    }

    fn paths(filer: &Filer<MemoryFileStore, MemoryWorkbook>) -> Vec<String> {
        filer.organizer().store().all_file_paths()
    }

    #[test]
    fn test_is_year_sheet() {
        assert!(is_year_sheet("2024"));
        assert!(!is_year_sheet("Totals"));
        assert!(!is_year_sheet("20245"));
        assert!(!is_year_sheet("FY24"));
    }

    #[test]
    fn test_handle_upload_success() {
        let filer = setup();
        let response = filer.handle_upload(&upload_request(sample_record(), FileCategory::Receipt));

        assert!(response.success, "{}", response.message);
        assert!(!response.file_id.is_empty());
        assert_eq!(
            response.message,
            "File uploaded successfully as 2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf"
        );
        assert_eq!(
            filer.records().workbook().cell("2024", 2, 6).as_deref(),
            Some("Yes")
        );
    }

    #[test]
    fn test_handle_upload_bad_content() {
        let filer = setup();
        let mut request = upload_request(sample_record(), FileCategory::Receipt);
        request.content = "not base64!!".to_string();

        let response = filer.handle_upload(&request);
        assert!(!response.success);
        assert!(response.file_id.is_empty());
        assert!(response.message.starts_with("Upload failed:"));
        assert!(paths(&filer).is_empty());
    }

    #[test]
    fn test_handle_upload_missing_sheet_reports_failure() {
        let filer = setup();
        let mut request = upload_request(sample_record(), FileCategory::Receipt);
        request.sheet = "2019".to_string();

        let response = filer.handle_upload(&request);
        assert!(!response.success);
        assert!(response.message.contains("2019"));
    }

    #[test]
    fn test_edit_paid_out_moves_file() {
        let filer = setup();
        filer.handle_upload(&upload_request(sample_record(), FileCategory::Receipt));

        filer.records().workbook().edit("2024", 2, Column::PaidOut.index(), "Yes");
        filer.handle_edit(&edit("2024", 2, Column::PaidOut));

        assert_eq!(
            paths(&filer),
            vec!["financial/hsa-receipts/2024/paid-out/receipts/2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf"]
        );
    }

    #[test]
    fn test_edit_company_renames_file() {
        let filer = setup();
        filer.handle_upload(&upload_request(sample_record(), FileCategory::Invoice));

        filer.records().workbook().edit("2024", 2, Column::Company.index(), "Beta Clinic");
        filer.handle_edit(&edit("2024", 2, Column::Company));

        // The renamed record no longer matches the old name, so nothing is found
        assert_eq!(
            paths(&filer),
            vec!["financial/hsa-receipts/2024/to-be-paid-out/invoices/2024-03-15_jane-doe_invoice_acme-health_x-ray.pdf"]
        );
    }

    #[test]
    fn test_edit_service_renames_loosely_matched_file() {
        let filer = setup();
        let mut record = sample_record();
        record.service = "X-Ray Follow Up".to_string();
        filer.handle_upload(&upload_request(record, FileCategory::Receipt));

        // The row now says "X-Ray"; "_x-ray" is still a substring of the stored name
        filer.handle_edit(&edit("2024", 2, Column::Service));

        assert_eq!(
            paths(&filer),
            vec!["financial/hsa-receipts/2024/to-be-paid-out/receipts/2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf"]
        );
    }

    #[test]
    fn test_edit_ignored_outside_year_sheets_and_header() {
        let filer = setup();
        filer.handle_upload(&upload_request(sample_record(), FileCategory::Receipt));
        let before = paths(&filer);

        filer.records().workbook().edit("2024", 2, Column::PaidOut.index(), "Yes");
        filer.handle_edit(&edit("Notes", 2, Column::PaidOut));
        filer.handle_edit(&edit("2024", 1, Column::PaidOut));
        filer.handle_edit(&edit("2024", 2, Column::Cost));
        filer.handle_edit(&edit("2024", 2, Column::HsaApproved));

        assert_eq!(paths(&filer), before);
    }

    #[test]
    fn test_edit_multi_row_range() {
        let filer = setup();
        let jane = sample_record();
        let john = filer.records().get_record("2024", 3).unwrap().unwrap();
        filer.handle_upload(&upload_request(jane, FileCategory::Receipt));
        filer.handle_upload(&upload_request(john, FileCategory::Receipt));

        let workbook = filer.records().workbook();
        workbook.edit("2024", 2, Column::PaidOut.index(), "Yes");
        workbook.edit("2024", 3, Column::PaidOut.index(), "Yes");

        filer.handle_edit(&EditEvent {
            sheet: "2024".to_string(),
            range: CellRange {
                row: 1,
                column: 1,
                num_rows: 4,
                num_columns: 8,
            },
        });

        assert_eq!(
            paths(&filer),
            vec![
                "financial/hsa-receipts/2024/paid-out/receipts/2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf",
                "financial/hsa-receipts/2024/paid-out/receipts/2024-05-02_john-roe_receipt_beta-clinic_dental-cleaning.pdf",
            ]
        );
    }

    #[test]
    fn test_edit_bad_row_is_swallowed() {
        let filer = setup();
        filer.records().workbook().edit("2024", 2, Column::PaymentDate.index(), "someday");
        // Must not panic or propagate
        filer.handle_edit(&edit("2024", 2, Column::PaymentDate));
        filer.handle_edit(&edit("2031", 2, Column::PaymentDate));
    }

    #[test]
    fn test_edit_huge_range_stops_at_last_row() {
        let filer = setup();
        filer.handle_upload(&upload_request(sample_record(), FileCategory::Receipt));
        filer.records().workbook().edit("2024", 2, Column::PaidOut.index(), "Yes");

        let before = filer.records().workbook().reads();
        filer.handle_edit(&EditEvent {
            sheet: "2024".to_string(),
            range: CellRange {
                row: 1,
                column: 1,
                num_rows: usize::MAX,
                num_columns: usize::MAX,
            },
        });

        assert_eq!(
            paths(&filer),
            vec!["financial/hsa-receipts/2024/paid-out/receipts/2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf"]
        );
        // Rows 2 to 4 only
        assert!(filer.records().workbook().reads() - before <= 3);
    }

    #[test]
    fn test_refresh_sheet_repairs_locations() {
        let filer = setup();
        filer.handle_upload(&upload_request(sample_record(), FileCategory::Receipt));

        // Flag changed without a change notification
        filer.records().workbook().edit("2024", 2, Column::PaidOut.index(), "Yes");

        let summary = filer.refresh_sheet("2024").unwrap();
        assert_eq!(
            summary,
            RefreshSummary {
                rows_scanned: 3,
                files_checked: 1,
                files_updated: 1,
                failures: 0,
            }
        );
        assert_eq!(
            paths(&filer),
            vec!["financial/hsa-receipts/2024/paid-out/receipts/2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf"]
        );

        let again = filer.refresh_sheet("2024").unwrap();
        assert_eq!(again.files_updated, 0);
    }

    #[test]
    fn test_refresh_reads_sheet_once() {
        let filer = setup();
        filer.handle_upload(&upload_request(sample_record(), FileCategory::Receipt));

        let before = filer.records().workbook().reads();
        let summary = filer.refresh_sheet("2024").unwrap();
        assert_eq!(summary.rows_scanned, 3);
        assert_eq!(filer.records().workbook().reads() - before, 1);
    }

    #[test]
    fn test_refresh_rejects_non_year_sheet() {
        let filer = setup();
        assert!(filer.refresh_sheet("Totals").is_err());
        assert!(matches!(
            filer.refresh_sheet("2019"),
            Err(Error::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_refresh_counts_bad_rows() {
        let filer = setup();
        filer.records().workbook().edit("2024", 3, Column::PaymentDate.index(), "??");
        let summary = filer.refresh_sheet("2024").unwrap();
        assert_eq!(summary.failures, 1);
    }

    #[test]
    fn test_record_context_and_plan() {
        let filer = setup();
        let ctx = filer.record_context("2024", 2).unwrap();
        let plan = filer.filing_plan(&ctx);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].folder, "financial/hsa-receipts/2024/to-be-paid-out/receipts");
        assert_eq!(plan[0].filename, "2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf");
        assert_eq!(plan[1].folder, "financial/hsa-receipts/2024/to-be-paid-out/invoices");

        assert!(filer.record_context("2024", 1).is_err());
        assert!(filer.record_context("Totals", 2).is_err());
        let blank = filer.record_context("2024", 4).unwrap();
        assert!(blank.record.is_none());
        assert!(filer.filing_plan(&blank).is_empty());
    }

    #[test]
    fn test_active_context_follows_selection() {
        let filer = setup();
        assert!(filer.active_context().is_none());
        filer.records().workbook().select("2024", 3);
        let ctx = filer.active_context().unwrap();
        assert_eq!(ctx.record.unwrap().patient, "John Roe");
    }

    #[test]
    fn test_files_for_row() {
        let filer = setup();
        filer.handle_upload(&upload_request(sample_record(), FileCategory::Receipt));
        assert_eq!(filer.files_for_row("2024", 2).unwrap().len(), 1);
        assert!(filer.files_for_row("2024", 3).unwrap().is_empty());
        assert!(filer.files_for_row("2024", 4).unwrap().is_empty());
    }
}
