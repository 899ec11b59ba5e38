//! File store with pluggable backends
//!
//! The organizer only needs a small slice of a hierarchical file store:
//! find or create folders by exact name, create files, list a folder's direct
//! files, and move or rename a single file.
//!
//! # Architecture
//!
//! - `FileStore` trait defines the interface for storage backends
//! - `LocalFileStore` keeps the tree in a local directory
//! - `MemoryFileStore` (test utilities) models a cloud drive where sibling
//!   folders may share a name
//!
//! Folders and files are addressed through opaque ids. Two folders with the
//! same name are still different folders; only ids are compared.

use serde::{Deserialize, Serialize};

use crate::error::Result;

mod local;

pub use local::LocalFileStore;

/// Identity of a folder within a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(pub String);

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a file within a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub String);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a file in the store
///
/// A handle is a snapshot: after a move or rename the store returns a new
/// handle and the old one should be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    /// The single folder holding the file
    pub parent: FolderId,
}

/// Trait for hierarchical file stores
///
/// Implementations handle storing documents in different places:
/// - Local filesystem
/// - In-memory (tests)
pub trait FileStore: Send + Sync {
    /// Human-readable name for this store
    fn name(&self) -> &str;

    /// The top-level folder everything else hangs off
    fn root_folder(&self) -> Result<FolderId>;

    /// Find a direct child folder by exact, case-sensitive name
    ///
    /// When several children share the name, the first one wins.
    fn find_child_folder(&self, parent: &FolderId, name: &str) -> Result<Option<FolderId>>;

    /// Create a new child folder, even if one with that name exists
    fn create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId>;

    /// Display name of a folder
    fn folder_name(&self, folder: &FolderId) -> Result<String>;

    /// Store a new file in a folder
    fn create_file(
        &self,
        parent: &FolderId,
        name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<StoredFile>;

    /// Files (not folders) directly inside a folder
    fn list_files(&self, folder: &FolderId) -> Result<Vec<StoredFile>>;

    /// Detach a file from its parent and attach it to `destination`
    ///
    /// Moving a file into the folder it already sits in is a no-op.
    fn move_file(&self, file: &StoredFile, destination: &FolderId) -> Result<StoredFile>;

    /// Rename a file in place
    fn rename_file(&self, file: &StoredFile, new_name: &str) -> Result<StoredFile>;

    /// Get or create a child folder by name
    fn get_or_create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId> {
        match self.find_child_folder(parent, name)? {
            Some(folder) => Ok(folder),
            None => {
                tracing::debug!(store = self.name(), %parent, name, "Creating folder");
                self.create_folder(parent, name)
            }
        }
    }

    /// Get or create every folder along a `/`-separated path
    fn get_or_create_folder_path(&self, parent: &FolderId, path: &str) -> Result<FolderId> {
        let mut current = parent.clone();
        for part in path_parts(path) {
            current = self.get_or_create_folder(&current, part)?;
        }
        Ok(current)
    }

    /// Walk a `/`-separated path without creating anything
    fn find_folder_path(&self, parent: &FolderId, path: &str) -> Result<Option<FolderId>> {
        let mut current = parent.clone();
        for part in path_parts(path) {
            match self.find_child_folder(&current, part)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Walk a `/`-separated path starting at the store root
    fn find_folder_by_path(&self, path: &str) -> Result<Option<FolderId>> {
        let root = self.root_folder()?;
        self.find_folder_path(&root, path)
    }
}

/// Non-empty segments of a `/`-separated path
pub fn path_parts(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}
