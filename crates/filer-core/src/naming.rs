//! Canonical filenames for filed documents
//!
//! Filenames follow the layout shared with existing stored data:
//! `<yyyy-MM-dd>_<patient-slug>_<receipt|invoice>_<company-slug>_<service-slug>.<ext>`
//!
//! Everything here is a pure function of the record.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{FileCategory, Record};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Lowercase a field and collapse each whitespace run into one hyphen
///
/// Leading and trailing whitespace is not trimmed; it becomes a hyphen like
/// any other run so names stay identical to ones already in the store.
pub fn slug(value: &str) -> String {
    WHITESPACE.replace_all(&value.to_lowercase(), "-").into_owned()
}

/// Date token used at the start of every filename
pub fn date_token(record: &Record) -> String {
    record.payment_date.format("%Y-%m-%d").to_string()
}

/// Extension of a filename, lowercased, without the dot
///
/// Returns an empty string when the name has no dot.
pub fn file_extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => filename[idx + 1..].to_lowercase(),
        None => String::new(),
    }
}

/// Canonical filename for a record's document
pub fn compute_filename(record: &Record, category: FileCategory, extension: &str) -> String {
    format!(
        "{}_{}_{}_{}_{}.{}",
        date_token(record),
        slug(&record.patient),
        category.as_str(),
        slug(&record.company),
        slug(&record.service),
        extension
    )
}

/// Whether a stored filename looks like it belongs to the record
///
/// Deliberately loose: the name must start with `<date>_<patient>_` and
/// contain `_<company>_` and `_<service>` somewhere. Rows that share date,
/// patient, company and service match each other's files.
pub fn file_belongs_to_record(filename: &str, record: &Record) -> bool {
    let name = filename.to_lowercase();
    let prefix = format!("{}_{}_", date_token(record), slug(&record.patient));

    name.starts_with(&prefix)
        && name.contains(&format!("_{}_", slug(&record.company)))
        && name.contains(&format!("_{}", slug(&record.service)))
}

/// Category implied by a stored filename
pub fn category_from_filename(filename: &str) -> FileCategory {
    let token = format!("_{}_", FileCategory::Invoice.as_str());
    if filename.to_lowercase().contains(&token) {
        FileCategory::Invoice
    } else {
        FileCategory::Receipt
    }
}
