//! Domain models for filer

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One line item of the receipts workbook
///
/// The year folder is always derived from `payment_date` via [`Record::year`];
/// there is no separately stored year that could disagree with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(with = "payment_date_format")]
    pub payment_date: NaiveDate,
    pub patient: String,
    pub service: String,
    #[serde(default)]
    pub cost: f64,
    pub company: String,
    #[serde(default)]
    pub hsa_approved: bool,
    #[serde(default)]
    pub receipt_uploaded: bool,
    #[serde(default)]
    pub paid_out: bool,
    /// 1-based row in the source sheet (row 1 is the header)
    pub row_index: usize,
}

impl Record {
    pub fn year(&self) -> i32 {
        self.payment_date.year()
    }

    pub fn payout_status(&self) -> PayoutStatus {
        PayoutStatus::from_paid_out(self.paid_out)
    }

    /// Copy of this record with a different `paid_out` flag
    pub fn with_paid_out(&self, paid_out: bool) -> Self {
        Self {
            paid_out,
            ..self.clone()
        }
    }
}

mod payment_date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        crate::sheets::parse_date(&s).map_err(serde::de::Error::custom)
    }
}

/// Kind of document being filed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    #[default]
    Receipt,
    Invoice,
}

impl FileCategory {
    pub const ALL: [FileCategory; 2] = [Self::Receipt, Self::Invoice];

    /// Token used inside filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Invoice => "invoice",
        }
    }

    /// Name of the folder holding this category
    pub fn folder_name(&self) -> &'static str {
        match self {
            Self::Receipt => "receipts",
            Self::Invoice => "invoices",
        }
    }
}

impl std::str::FromStr for FileCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "receipt" | "receipts" => Ok(Self::Receipt),
            "invoice" | "invoices" => Ok(Self::Invoice),
            _ => Err(format!("Unknown file category: {}", s)),
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an expense has been reimbursed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayoutStatus {
    PaidOut,
    ToBePaidOut,
}

impl PayoutStatus {
    pub const ALL: [PayoutStatus; 2] = [Self::ToBePaidOut, Self::PaidOut];

    pub fn from_paid_out(paid_out: bool) -> Self {
        if paid_out {
            Self::PaidOut
        } else {
            Self::ToBePaidOut
        }
    }

    pub fn is_paid_out(&self) -> bool {
        matches!(self, Self::PaidOut)
    }

    /// Name of the folder holding files with this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaidOut => "paid-out",
            Self::ToBePaidOut => "to-be-paid-out",
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed column layout of a year sheet (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    PaymentDate = 0,
    Patient = 1,
    Service = 2,
    Cost = 3,
    Company = 4,
    HsaApproved = 5,
    ReceiptUploaded = 6,
    PaidOut = 7,
}

impl Column {
    /// Number of columns a record occupies
    pub const COUNT: usize = 8;

    /// Header row of a year sheet
    pub const HEADERS: [&'static str; Self::COUNT] = [
        "Payment Date",
        "Patient",
        "Service",
        "Cost",
        "Company",
        "HSA Approved",
        "Receipt Uploaded",
        "Paid Out",
    ];

    /// Columns whose edits can change a file's folder or name
    pub const TRACKED: [Column; 5] = [
        Self::PaymentDate,
        Self::Patient,
        Self::Service,
        Self::Company,
        Self::PaidOut,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_tracked(index: usize) -> bool {
        Self::TRACKED.iter().any(|c| c.index() == index)
    }
}

/// The row the user currently has selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub sheet: String,
    /// 1-based row
    pub row: usize,
}

/// Resolved "current record" context for the upload form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordContext {
    pub sheet: String,
    pub row_index: usize,
    pub record: Option<Record>,
}

/// Rectangular block of edited cells (1-based, like the spreadsheet it mirrors)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRange {
    pub row: usize,
    pub column: usize,
    #[serde(default = "one")]
    pub num_rows: usize,
    #[serde(default = "one")]
    pub num_columns: usize,
}

fn one() -> usize {
    1
}

impl CellRange {
    pub fn single(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            num_rows: 1,
            num_columns: 1,
        }
    }

    /// 1-based row numbers covered by the range
    pub fn rows(&self) -> impl Iterator<Item = usize> {
        self.row..self.row.saturating_add(self.num_rows.max(1))
    }

    /// 0-based column indices covered by the range, within the record layout
    pub fn column_indices(&self) -> impl Iterator<Item = usize> {
        let start = self.column.saturating_sub(1);
        let end = start
            .saturating_add(self.num_columns.max(1))
            .min(Column::HEADERS.len());
        start..end
    }

    pub fn touches(&self, column: Column) -> bool {
        self.column_indices().any(|i| i == column.index())
    }
}

/// Change notification for a block of edited cells
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEvent {
    pub sheet: String,
    pub range: CellRange,
}

/// Upload request from the form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Sheet the record was read from
    pub sheet: String,
    /// Original filename (only its extension is kept)
    pub filename: String,
    /// Base64 encoded file content
    pub content: String,
    pub mime_type: String,
    pub record: Record,
    #[serde(default)]
    pub category: FileCategory,
}

/// Result of an upload, never an error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: String,
    pub message: String,
}

/// Outcome of a full-sheet refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub rows_scanned: usize,
    pub files_checked: usize,
    pub files_updated: usize,
    pub failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            patient: "Jane Doe".to_string(),
            service: "X-Ray".to_string(),
            cost: 120.0,
            company: "Acme Health".to_string(),
            hsa_approved: true,
            receipt_uploaded: false,
            paid_out: false,
            row_index: 2,
        }
    }

    #[test]
    fn test_year_follows_payment_date() {
        let mut r = record();
        assert_eq!(r.year(), 2024);
        r.payment_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(r.year(), 2023);
    }

    #[test]
    fn test_payout_status() {
        assert_eq!(record().payout_status(), PayoutStatus::ToBePaidOut);
        assert_eq!(
            record().with_paid_out(true).payout_status(),
            PayoutStatus::PaidOut
        );
        assert_eq!(PayoutStatus::PaidOut.as_str(), "paid-out");
        assert_eq!(PayoutStatus::ToBePaidOut.as_str(), "to-be-paid-out");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Invoice".parse::<FileCategory>(), Ok(FileCategory::Invoice));
        assert_eq!("receipts".parse::<FileCategory>(), Ok(FileCategory::Receipt));
        assert!("bill".parse::<FileCategory>().is_err());
        assert_eq!(FileCategory::Invoice.folder_name(), "invoices");
    }

    #[test]
    fn test_record_json_ignores_year() {
        let json = r#"{
            "paymentDate": "2024-03-15T07:00:00.000Z",
            "patient": "Jane Doe",
            "service": "X-Ray",
            "cost": 120,
            "company": "Acme Health",
            "paidOut": true,
            "rowIndex": 4,
            "year": 1999
        }"#;
        let r: Record = serde_json::from_str(json).unwrap();
        assert_eq!(r.year(), 2024);
        assert!(r.paid_out);
        assert!(!r.hsa_approved);

        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out["paymentDate"], "2024-03-15");
        assert!(out.get("year").is_none());
    }

    #[test]
    fn test_cell_range() {
        let range = CellRange {
            row: 3,
            column: 4,
            num_rows: 2,
            num_columns: 3,
        };
        assert_eq!(range.rows().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(range.column_indices().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert!(range.touches(Column::Company));
        assert!(!range.touches(Column::PaidOut));
    }

    #[test]
    fn test_cell_range_huge_extent() {
        let range = CellRange {
            row: 2,
            column: 6,
            num_rows: usize::MAX,
            num_columns: usize::MAX,
        };
        assert_eq!(range.rows().take(2).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(range.column_indices().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert!(range.touches(Column::PaidOut));

        let past_layout = CellRange {
            row: usize::MAX,
            column: usize::MAX,
            num_rows: 5,
            num_columns: 5,
        };
        assert_eq!(past_layout.rows().count(), 0);
        assert_eq!(past_layout.column_indices().count(), 0);
    }

    #[test]
    fn test_tracked_columns() {
        assert!(Column::is_tracked(0));
        assert!(!Column::is_tracked(Column::Cost.index()));
        assert!(!Column::is_tracked(Column::HsaApproved.index()));
        assert!(Column::is_tracked(Column::PaidOut.index()));
    }
}
