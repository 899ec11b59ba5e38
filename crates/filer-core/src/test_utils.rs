//! Test utilities for filer-core
//!
//! In-memory stand-ins for the file store and the workbook. The memory store
//! behaves like a cloud drive: sibling folders may share a name, and every
//! file has exactly one parent.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::{Column, Record, Selection};
use crate::sheets::Workbook;
use crate::store::{FileId, FileStore, FolderId, StoredFile};

#[derive(Debug, Clone)]
struct MemoryFolder {
    name: String,
    parent: Option<u64>,
}

#[derive(Debug, Clone)]
struct MemoryFile {
    name: String,
    parent: u64,
    bytes: Vec<u8>,
    mime_type: String,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    next_id: u64,
    folders: HashMap<u64, MemoryFolder>,
    files: HashMap<u64, MemoryFile>,
    /// Folder names whose lookups fail as if access were denied
    denied: HashSet<String>,
}

impl MemoryStoreInner {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory file store
pub struct MemoryFileStore {
    inner: Mutex<MemoryStoreInner>,
}

const ROOT: u64 = 0;

fn parse_id(id: &str) -> Result<u64> {
    id.parse()
        .map_err(|_| Error::Store(format!("Malformed id: {}", id)))
}

impl MemoryFileStore {
    pub fn new() -> Self {
        let mut inner = MemoryStoreInner::default();
        inner.folders.insert(
            ROOT,
            MemoryFolder {
                name: "My Drive".to_string(),
                parent: None,
            },
        );
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every lookup of a child folder with this name fail
    pub fn deny_access(&self, folder_name: &str) {
        self.lock().denied.insert(folder_name.to_string());
    }

    /// Create a folder path from the root, reusing existing folders
    pub fn mkdirs(&self, path: &str) -> FolderId {
        let root = self.root_folder().unwrap();
        self.get_or_create_folder_path(&root, path).unwrap()
    }

    /// Full `/`-joined path of a folder from the root (root excluded)
    pub fn folder_path(&self, folder: &FolderId) -> String {
        let inner = self.lock();
        let mut parts = Vec::new();
        let mut current = parse_id(&folder.0).ok();
        while let Some(id) = current {
            let Some(f) = inner.folders.get(&id) else {
                break;
            };
            if f.parent.is_some() {
                parts.push(f.name.clone());
            }
            current = f.parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Paths of every stored file (`folder/.../name`), sorted
    pub fn all_file_paths(&self) -> Vec<String> {
        let files: Vec<_> = self
            .lock()
            .files
            .values()
            .map(|f| (f.parent, f.name.clone()))
            .collect();
        let mut paths: Vec<_> = files
            .into_iter()
            .map(|(parent, name)| {
                let folder = self.folder_path(&FolderId(parent.to_string()));
                if folder.is_empty() {
                    name
                } else {
                    format!("{}/{}", folder, name)
                }
            })
            .collect();
        paths.sort();
        paths
    }

    /// Number of folders with this name anywhere in the store
    pub fn count_folders_named(&self, name: &str) -> usize {
        self.lock()
            .folders
            .values()
            .filter(|f| f.name == name)
            .count()
    }

    /// Bytes and MIME type of a stored file
    pub fn file_content(&self, file: &FileId) -> Option<(Vec<u8>, String)> {
        let id = parse_id(&file.0).ok()?;
        self.lock()
            .files
            .get(&id)
            .map(|f| (f.bytes.clone(), f.mime_type.clone()))
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore for MemoryFileStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn root_folder(&self) -> Result<FolderId> {
        Ok(FolderId(ROOT.to_string()))
    }

    fn find_child_folder(&self, parent: &FolderId, name: &str) -> Result<Option<FolderId>> {
        let parent = parse_id(&parent.0)?;
        let inner = self.lock();
        if inner.denied.contains(name) {
            return Err(Error::Store(format!("Access denied: {}", name)));
        }
        if !inner.folders.contains_key(&parent) {
            return Err(Error::NotFound(format!("Folder not found: {}", parent)));
        }

        // Oldest folder wins when names repeat
        let mut matches: Vec<u64> = inner
            .folders
            .iter()
            .filter(|(_, f)| f.parent == Some(parent) && f.name == name)
            .map(|(id, _)| *id)
            .collect();
        matches.sort();
        Ok(matches.first().map(|id| FolderId(id.to_string())))
    }

    fn create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId> {
        let parent = parse_id(&parent.0)?;
        let mut inner = self.lock();
        if !inner.folders.contains_key(&parent) {
            return Err(Error::NotFound(format!("Folder not found: {}", parent)));
        }
        let id = inner.allocate();
        inner.folders.insert(
            id,
            MemoryFolder {
                name: name.to_string(),
                parent: Some(parent),
            },
        );
        Ok(FolderId(id.to_string()))
    }

    fn folder_name(&self, folder: &FolderId) -> Result<String> {
        let id = parse_id(&folder.0)?;
        self.lock()
            .folders
            .get(&id)
            .map(|f| f.name.clone())
            .ok_or_else(|| Error::NotFound(format!("Folder not found: {}", folder)))
    }

    fn create_file(
        &self,
        parent: &FolderId,
        name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<StoredFile> {
        let parent_id = parse_id(&parent.0)?;
        let mut inner = self.lock();
        if !inner.folders.contains_key(&parent_id) {
            return Err(Error::NotFound(format!("Folder not found: {}", parent)));
        }
        let id = inner.allocate();
        inner.files.insert(
            id,
            MemoryFile {
                name: name.to_string(),
                parent: parent_id,
                bytes: bytes.to_vec(),
                mime_type: mime_type.to_string(),
            },
        );
        Ok(StoredFile {
            id: FileId(id.to_string()),
            name: name.to_string(),
            parent: parent.clone(),
        })
    }

    fn list_files(&self, folder: &FolderId) -> Result<Vec<StoredFile>> {
        let folder_id = parse_id(&folder.0)?;
        let inner = self.lock();
        if !inner.folders.contains_key(&folder_id) {
            return Err(Error::NotFound(format!("Folder not found: {}", folder)));
        }
        let mut files: Vec<_> = inner
            .files
            .iter()
            .filter(|(_, f)| f.parent == folder_id)
            .map(|(id, f)| StoredFile {
                id: FileId(id.to_string()),
                name: f.name.clone(),
                parent: folder.clone(),
            })
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.0.cmp(&b.id.0)));
        Ok(files)
    }

    fn move_file(&self, file: &StoredFile, destination: &FolderId) -> Result<StoredFile> {
        let file_id = parse_id(&file.id.0)?;
        let dest_id = parse_id(&destination.0)?;
        let mut inner = self.lock();
        if !inner.folders.contains_key(&dest_id) {
            return Err(Error::NotFound(format!("Folder not found: {}", destination)));
        }
        let stored = inner
            .files
            .get_mut(&file_id)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file.id)))?;
        stored.parent = dest_id;
        Ok(StoredFile {
            id: file.id.clone(),
            name: stored.name.clone(),
            parent: destination.clone(),
        })
    }

    fn rename_file(&self, file: &StoredFile, new_name: &str) -> Result<StoredFile> {
        let file_id = parse_id(&file.id.0)?;
        let mut inner = self.lock();
        let stored = inner
            .files
            .get_mut(&file_id)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file.id)))?;
        stored.name = new_name.to_string();
        Ok(StoredFile {
            id: file.id.clone(),
            name: new_name.to_string(),
            parent: FolderId(stored.parent.to_string()),
        })
    }
}

/// In-memory workbook
#[derive(Default)]
pub struct MemoryWorkbook {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    selection: Mutex<Option<Selection>>,
    reads: AtomicUsize,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    fn sheets(&self) -> MutexGuard<'_, HashMap<String, Vec<Vec<String>>>> {
        self.sheets.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_sheet(&self, name: &str, rows: &[&[&str]]) {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets().insert(name.to_string(), rows);
    }

    /// Overwrite a cell (1-based row, 0-based column) the way a user edit would
    pub fn edit(&self, sheet: &str, row: usize, column: usize, value: &str) {
        self.write_cell(sheet, row, column, value).unwrap();
    }

    pub fn select(&self, sheet: &str, row: usize) {
        *self.selection.lock().unwrap_or_else(|e| e.into_inner()) = Some(Selection {
            sheet: sheet.to_string(),
            row,
        });
    }

    /// Number of row or sheet reads so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn cell(&self, sheet: &str, row: usize, column: usize) -> Option<String> {
        self.sheets()
            .get(sheet)?
            .get(row.checked_sub(1)?)?
            .get(column)
            .cloned()
    }
}

impl Workbook for MemoryWorkbook {
    fn has_sheet(&self, sheet: &str) -> Result<bool> {
        Ok(self.sheets().contains_key(sheet))
    }

    fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let sheets = self.sheets();
        let rows = sheets
            .get(sheet)
            .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))?;
        Ok(row
            .checked_sub(1)
            .and_then(|i| rows.get(i))
            .cloned()
            .unwrap_or_default())
    }

    fn read_sheet(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.sheets()
            .get(sheet)
            .cloned()
            .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))
    }

    fn row_count(&self, sheet: &str) -> Result<usize> {
        self.sheets()
            .get(sheet)
            .map(Vec::len)
            .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))
    }

    fn write_cell(&self, sheet: &str, row: usize, column: usize, value: &str) -> Result<()> {
        let mut sheets = self.sheets();
        let rows = sheets
            .get_mut(sheet)
            .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))?;
        if row == 0 {
            return Err(Error::InvalidData("Rows are numbered from 1".to_string()));
        }
        if rows.len() < row {
            rows.resize(row, Vec::new());
        }
        let cells = &mut rows[row - 1];
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        cells[column] = value.to_string();
        Ok(())
    }

    fn active_selection(&self) -> Option<Selection> {
        self.selection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Record used throughout the tests: Jane Doe's X-Ray at Acme Health
pub fn sample_record() -> Record {
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

/// Header row of a year sheet
pub const SHEET_HEADER: [&str; 8] = Column::HEADERS;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_allows_duplicate_folder_names() {
        let store = MemoryFileStore::new();
        let root = store.root_folder().unwrap();
        let a = store.create_folder(&root, "2024").unwrap();
        let b = store.create_folder(&root, "2024").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count_folders_named("2024"), 2);
        // Lookup returns the first one created
        assert_eq!(store.find_child_folder(&root, "2024").unwrap(), Some(a));
    }

    #[test]
    fn test_memory_store_move_keeps_single_parent() {
        let store = MemoryFileStore::new();
        let from = store.mkdirs("a");
        let to = store.mkdirs("b");
        let file = store.create_file(&from, "x.pdf", b"1", "application/pdf").unwrap();

        let moved = store.move_file(&file, &to).unwrap();
        assert_eq!(moved.id, file.id);
        assert!(store.list_files(&from).unwrap().is_empty());
        assert_eq!(store.all_file_paths(), vec!["b/x.pdf"]);
    }

    #[test]
    fn test_memory_store_denied_lookup() {
        let store = MemoryFileStore::new();
        store.mkdirs("Computers");
        store.deny_access("Computers");
        assert!(store.find_folder_by_path("Computers").is_err());
    }
}
