//! Folder layout and file reconciliation
//!
//! Every document lives at
//! `<root>/<base_path>/<year>/<paid-out|to-be-paid-out>/<receipts|invoices>/<filename>`
//! where all segments and the filename are computed from the record. Nothing
//! about a record's location is stored; when the record changes, the file is
//! moved and/or renamed to match.
//!
//! The root is the configured alternate root when it can be found, otherwise
//! the store root.

use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::models::{FileCategory, PayoutStatus, Record};
use crate::naming;
use crate::store::{path_parts, FileStore, FolderId, StoredFile};

/// Resolved chain of folders for one record and category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPath {
    /// Folder holding the year folders (base path applied)
    pub root: FolderId,
    pub year: FolderId,
    pub status: FolderId,
    /// Deepest folder; documents are stored here
    pub category: FolderId,
    /// Segment names below the store root: base path parts, year, status, category
    pub segments: Vec<String>,
}

impl FolderPath {
    /// The folder documents are stored in
    pub fn type_folder(&self) -> &FolderId {
        &self.category
    }

    /// `/`-joined segment names
    pub fn display(&self) -> String {
        self.segments.join("/")
    }
}

/// Folder segment names below the base path for a record
pub fn folder_segments(record: &Record, category: FileCategory) -> [String; 3] {
    [
        record.year().to_string(),
        record.payout_status().as_str().to_string(),
        category.folder_name().to_string(),
    ]
}

/// Computes where a record's documents belong and keeps them there
pub struct FileOrganizer<S: FileStore> {
    store: S,
    config: StoreConfig,
}

impl<S: FileStore> FileOrganizer<S> {
    pub fn new(store: S, config: StoreConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Canonical filename for a record's document
    pub fn compute_filename(
        &self,
        record: &Record,
        category: FileCategory,
        extension: &str,
    ) -> String {
        naming::compute_filename(record, category, extension)
    }

    /// Folder holding the year folders, created if missing
    ///
    /// Tries the alternate root first. Any failure there (missing, access
    /// error) is logged and the store root is used instead.
    pub fn root_folder(&self) -> Result<(FolderId, Vec<String>)> {
        if let Some(alternate) = &self.config.alternate_root {
            match self.alternate_root_folder(alternate) {
                Ok(Some(folder)) => {
                    return Ok((folder, self.root_segments(Some(alternate.as_str()))));
                }
                Ok(None) => {
                    debug!("Alternate root {} not present, using the store root", alternate);
                }
                Err(e) => {
                    warn!(
                        "Could not access {}, falling back to the store root: {}",
                        alternate, e
                    );
                }
            }
        }

        let root = self.store.root_folder()?;
        let folder = self
            .store
            .get_or_create_folder_path(&root, &self.config.base_path)?;
        Ok((folder, self.root_segments(None)))
    }

    fn alternate_root_folder(&self, alternate: &str) -> Result<Option<FolderId>> {
        match self.store.find_folder_by_path(alternate)? {
            Some(folder) => Ok(Some(
                self.store
                    .get_or_create_folder_path(&folder, &self.config.base_path)?,
            )),
            None => Ok(None),
        }
    }

    /// Root folder lookup that never creates folders
    fn find_root_folder(&self) -> Result<Option<FolderId>> {
        if let Some(alternate) = &self.config.alternate_root {
            match self.store.find_folder_by_path(alternate) {
                Ok(Some(folder)) => {
                    return self.store.find_folder_path(&folder, &self.config.base_path)
                }
                Ok(None) => debug!("Alternate root {} not present", alternate),
                Err(e) => warn!(
                    "Could not access {}, falling back to the store root: {}",
                    alternate, e
                ),
            }
        }

        let root = self.store.root_folder()?;
        self.store.find_folder_path(&root, &self.config.base_path)
    }

    fn root_segments(&self, alternate: Option<&str>) -> Vec<String> {
        alternate
            .into_iter()
            .flat_map(path_parts)
            .chain(path_parts(&self.config.base_path))
            .map(str::to_string)
            .collect()
    }

    /// Resolve (creating as needed) the folder chain for a record's documents
    pub fn resolve_folder_path(
        &self,
        record: &Record,
        category: FileCategory,
    ) -> Result<FolderPath> {
        let (root, mut segments) = self.root_folder()?;
        let [year_name, status_name, category_name] = folder_segments(record, category);

        let year = self.store.get_or_create_folder(&root, &year_name)?;
        let status = self.store.get_or_create_folder(&year, &status_name)?;
        let category_folder = self.store.get_or_create_folder(&status, &category_name)?;

        segments.extend([year_name, status_name, category_name]);

        Ok(FolderPath {
            root,
            year,
            status,
            category: category_folder,
            segments,
        })
    }

    /// Folder a record's documents would sit in, without creating anything
    pub fn find_type_folder(
        &self,
        record: &Record,
        category: FileCategory,
    ) -> Result<Option<FolderId>> {
        let Some(root) = self.find_root_folder()? else {
            return Ok(None);
        };
        let path = folder_segments(record, category).join("/");
        self.store.find_folder_path(&root, &path)
    }

    /// Store a new document for a record
    ///
    /// The caller's filename only contributes its extension. No duplicate
    /// check is made; uploading twice stores two files.
    pub fn upload(
        &self,
        bytes: &[u8],
        mime_type: &str,
        filename: &str,
        record: &Record,
        category: FileCategory,
    ) -> Result<StoredFile> {
        let path = self.resolve_folder_path(record, category)?;
        let extension = naming::file_extension(filename);
        let name = self.compute_filename(record, category, &extension);

        let file = self
            .store
            .create_file(path.type_folder(), &name, bytes, mime_type)?;

        info!(file = %file.id, "File uploaded: {} to {}", file.name, path.display());
        Ok(file)
    }

    /// Move and/or rename a document after its record changed
    ///
    /// The file is moved when the old and new records resolve to different
    /// folders (compared by identity, not name), and renamed when its current
    /// name differs from the one the new record produces.
    pub fn reconcile(
        &self,
        old_record: &Record,
        new_record: &Record,
        category: FileCategory,
        file: &StoredFile,
    ) -> Result<StoredFile> {
        let old_path = self.resolve_folder_path(old_record, category)?;
        let new_path = self.resolve_folder_path(new_record, category)?;

        let extension = naming::file_extension(&file.name);
        let new_name = self.compute_filename(new_record, category, &extension);

        let mut file = file.clone();

        if old_path.type_folder() != new_path.type_folder() {
            file = self.store.move_file(&file, new_path.type_folder())?;
            info!(
                file = %file.id,
                "File moved from {} to {}",
                old_path.display(),
                new_path.display()
            );
        }

        if file.name != new_name {
            file = self.store.rename_file(&file, &new_name)?;
            info!(file = %file.id, "File renamed to {}", file.name);
        }

        Ok(file)
    }

    /// Put a file where the record says it belongs, wherever it sits now
    ///
    /// Returns the updated handle and whether anything changed.
    pub fn place_file(
        &self,
        record: &Record,
        category: FileCategory,
        file: &StoredFile,
    ) -> Result<(StoredFile, bool)> {
        let target = self.resolve_folder_path(record, category)?;
        let extension = naming::file_extension(&file.name);
        let name = self.compute_filename(record, category, &extension);

        let mut file = file.clone();
        let mut changed = false;

        if &file.parent != target.type_folder() {
            file = self.store.move_file(&file, target.type_folder())?;
            info!(file = %file.id, "File moved to {}", target.display());
            changed = true;
        }

        if file.name != name {
            file = self.store.rename_file(&file, &name)?;
            info!(file = %file.id, "File renamed to {}", file.name);
            changed = true;
        }

        Ok((file, changed))
    }

    /// Every stored document that looks like it belongs to the record
    ///
    /// Searches all four category/status folders, since the record's current
    /// payout flag may not match where its files were last put. Missing or
    /// unreadable folders contribute nothing.
    pub fn find_files_for_record(&self, record: &Record) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();

        for category in FileCategory::ALL {
            for status in PayoutStatus::ALL {
                let search = record.with_paid_out(status.is_paid_out());

                let folder = match self.find_type_folder(&search, category) {
                    Ok(Some(folder)) => folder,
                    Ok(None) => continue,
                    Err(e) => {
                        debug!(%category, %status, "Skipping folder: {}", e);
                        continue;
                    }
                };

                let listing = match self.store.list_files(&folder) {
                    Ok(listing) => listing,
                    Err(e) => {
                        debug!(%category, %status, "Skipping folder: {}", e);
                        continue;
                    }
                };

                files.extend(
                    listing
                        .into_iter()
                        .filter(|f| naming::file_belongs_to_record(&f.name, record)),
                );
            }
        }

        debug!(row = record.row_index, count = files.len(), "Found files for record");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_record, MemoryFileStore};

    fn config() -> StoreConfig {
        StoreConfig {
            root_dir: "unused".into(),
            base_path: "financial/hsa-receipts".to_string(),
            alternate_root: Some("Computers/My Computers".to_string()),
        }
    }

    fn organizer() -> FileOrganizer<MemoryFileStore> {
        FileOrganizer::new(MemoryFileStore::new(), config())
    }

    fn upload(org: &FileOrganizer<MemoryFileStore>, record: &Record) -> StoredFile {
        org.upload(b"%PDF", "application/pdf", "scan.PDF", record, FileCategory::Receipt)
            .unwrap()
    }

    #[test]
    fn test_resolve_folder_path_segments() {
        let org = organizer();
        let record = sample_record();

        let path = org.resolve_folder_path(&record, FileCategory::Receipt).unwrap();
        assert_eq!(
            path.display(),
            "financial/hsa-receipts/2024/to-be-paid-out/receipts"
        );
        assert_eq!(
            org.store().folder_path(path.type_folder()),
            "financial/hsa-receipts/2024/to-be-paid-out/receipts"
        );

        let paid = org
            .resolve_folder_path(&record.with_paid_out(true), FileCategory::Invoice)
            .unwrap();
        assert_eq!(paid.display(), "financial/hsa-receipts/2024/paid-out/invoices");
        assert_eq!(paid.year, path.year);
        assert_ne!(paid.status, path.status);
    }

    #[test]
    fn test_resolve_folder_path_is_stable() {
        let org = organizer();
        let record = sample_record();

        let first = org.resolve_folder_path(&record, FileCategory::Receipt).unwrap();
        let second = org.resolve_folder_path(&record, FileCategory::Receipt).unwrap();
        assert_eq!(first, second);
        assert_eq!(org.store().count_folders_named("receipts"), 1);
    }

    #[test]
    fn test_resolve_uses_alternate_root_when_present() {
        let org = organizer();
        org.store().mkdirs("Computers/My Computers");

        let path = org
            .resolve_folder_path(&sample_record(), FileCategory::Receipt)
            .unwrap();
        assert_eq!(
            path.display(),
            "Computers/My Computers/financial/hsa-receipts/2024/to-be-paid-out/receipts"
        );
        assert_eq!(org.store().folder_path(path.type_folder()), path.display());
    }

    #[test]
    fn test_resolve_falls_back_when_alternate_root_inaccessible() {
        let org = organizer();
        org.store().mkdirs("Computers/My Computers");
        org.store().deny_access("Computers");

        let path = org
            .resolve_folder_path(&sample_record(), FileCategory::Receipt)
            .unwrap();
        assert_eq!(
            org.store().folder_path(path.type_folder()),
            "financial/hsa-receipts/2024/to-be-paid-out/receipts"
        );
    }

    #[test]
    fn test_upload_uses_canonical_name() {
        let org = organizer();
        let record = sample_record();

        let file = upload(&org, &record);
        assert_eq!(file.name, "2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf");
        assert_eq!(
            org.store().all_file_paths(),
            vec!["financial/hsa-receipts/2024/to-be-paid-out/receipts/2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf"]
        );
        let (bytes, mime) = org.store().file_content(&file.id).unwrap();
        assert_eq!(bytes, b"%PDF");
        assert_eq!(mime, "application/pdf");
    }

    #[test]
    fn test_upload_twice_creates_two_files() {
        let org = organizer();
        let record = sample_record();
        upload(&org, &record);
        upload(&org, &record);
        assert_eq!(org.store().all_file_paths().len(), 2);
    }

    #[test]
    fn test_reconcile_moves_on_payout_change() {
        let org = organizer();
        let old = sample_record();
        let file = upload(&org, &old);

        let new = old.with_paid_out(true);
        let moved = org.reconcile(&old, &new, FileCategory::Receipt, &file).unwrap();

        assert_eq!(moved.id, file.id);
        assert_eq!(moved.name, file.name);
        assert_eq!(
            org.store().all_file_paths(),
            vec!["financial/hsa-receipts/2024/paid-out/receipts/2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf"]
        );
    }

    #[test]
    fn test_reconcile_renames_on_company_change() {
        let org = organizer();
        let old = sample_record();
        let file = upload(&org, &old);

        let mut new = old.clone();
        new.company = "Beta Clinic".to_string();
        let renamed = org.reconcile(&old, &new, FileCategory::Receipt, &file).unwrap();

        assert_eq!(renamed.parent, file.parent);
        assert_eq!(renamed.name, "2024-03-15_jane-doe_receipt_beta-clinic_x-ray.pdf");
        assert_eq!(
            org.store().all_file_paths(),
            vec!["financial/hsa-receipts/2024/to-be-paid-out/receipts/2024-03-15_jane-doe_receipt_beta-clinic_x-ray.pdf"]
        );
    }

    #[test]
    fn test_reconcile_moves_and_renames_on_date_change() {
        let org = organizer();
        let old = sample_record();
        let file = upload(&org, &old);

        let mut new = old.clone();
        new.payment_date = chrono::NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        org.reconcile(&old, &new, FileCategory::Receipt, &file).unwrap();

        assert_eq!(
            org.store().all_file_paths(),
            vec!["financial/hsa-receipts/2025/to-be-paid-out/receipts/2025-01-02_jane-doe_receipt_acme-health_x-ray.pdf"]
        );
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let org = organizer();
        let old = sample_record();
        let file = upload(&org, &old);
        let mut new = old.with_paid_out(true);
        new.service = "MRI Scan".to_string();

        let once = org.reconcile(&old, &new, FileCategory::Receipt, &file).unwrap();
        let paths_once = org.store().all_file_paths();

        let twice = org.reconcile(&old, &new, FileCategory::Receipt, &once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(org.store().all_file_paths(), paths_once);
    }

    #[test]
    fn test_reconcile_unchanged_record_is_noop() {
        let org = organizer();
        let record = sample_record();
        let file = upload(&org, &record);

        let same = org.reconcile(&record, &record, FileCategory::Receipt, &file).unwrap();
        assert_eq!(same, file);
    }

    #[test]
    fn test_reconcile_compares_folder_identity_not_name() {
        let org = organizer();
        let record = sample_record();
        let file = upload(&org, &record);

        // A second, identically named status folder elsewhere does not confuse the move
        let other_year = org.store().mkdirs("elsewhere/2024/paid-out/receipts");
        assert_eq!(org.store().folder_name(&other_year).unwrap(), "receipts");

        let moved = org
            .reconcile(&record, &record.with_paid_out(true), FileCategory::Receipt, &file)
            .unwrap();
        assert_ne!(moved.parent, other_year);
        assert_eq!(
            org.store().folder_path(&moved.parent),
            "financial/hsa-receipts/2024/paid-out/receipts"
        );
    }

    #[test]
    fn test_place_file_uses_actual_location() {
        let org = organizer();
        let record = sample_record();
        // Filed under paid-out by hand although the row says otherwise
        let file = upload(&org, &record.with_paid_out(true));

        let (placed, changed) = org.place_file(&record, FileCategory::Receipt, &file).unwrap();
        assert!(changed);
        assert_eq!(
            org.store().folder_path(&placed.parent),
            "financial/hsa-receipts/2024/to-be-paid-out/receipts"
        );

        let (again, changed) = org.place_file(&record, FileCategory::Receipt, &placed).unwrap();
        assert!(!changed);
        assert_eq!(again, placed);
    }

    #[test]
    fn test_find_files_after_upload() {
        let org = organizer();
        let record = sample_record();
        let file = upload(&org, &record);

        let found = org.find_files_for_record(&record).unwrap();
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn test_find_files_searches_all_status_folders() {
        let org = organizer();
        let record = sample_record();
        upload(&org, &record);
        org.upload(
            b"inv",
            "image/png",
            "bill.png",
            &record.with_paid_out(true),
            FileCategory::Invoice,
        )
        .unwrap();

        // Flag flipped since the receipt was filed; both files are still found
        let found = org.find_files_for_record(&record.with_paid_out(true)).unwrap();
        let mut names: Vec<_> = found.into_iter().map(|f| f.name).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "2024-03-15_jane-doe_invoice_acme-health_x-ray.png",
                "2024-03-15_jane-doe_receipt_acme-health_x-ray.pdf",
            ]
        );
    }

    #[test]
    fn test_find_files_ignores_other_records() {
        let org = organizer();
        let record = sample_record();
        let mut other = record.clone();
        other.patient = "John Roe".to_string();
        upload(&org, &other);

        assert!(org.find_files_for_record(&record).unwrap().is_empty());
    }

    #[test]
    fn test_find_files_creates_no_folders() {
        let org = organizer();
        let found = org.find_files_for_record(&sample_record()).unwrap();
        assert!(found.is_empty());
        assert_eq!(org.store().count_folders_named("hsa-receipts"), 0);
    }
}
