//! Local filesystem file store

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::info;

use super::{FileId, FileStore, FolderId, StoredFile};
use crate::error::{Error, Result};

/// File store backed by a directory tree
///
/// Folder and file ids are paths relative to the root directory, joined with
/// `/`. The root folder's id is the empty string.
pub struct LocalFileStore {
    /// Directory acting as the store root
    root_dir: PathBuf,
}

impl LocalFileStore {
    /// Create a new local store
    ///
    /// Creates the root directory if it doesn't exist.
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();

        if !root_dir.exists() {
            fs::create_dir_all(&root_dir).map_err(|e| {
                Error::Store(format!(
                    "Failed to create store directory {}: {}",
                    root_dir.display(),
                    e
                ))
            })?;
            info!("Created store directory: {}", root_dir.display());
        }

        Ok(Self { root_dir })
    }

    /// Get the store root directory
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Absolute path of a folder or file id
    pub fn path_of(&self, id: &str) -> PathBuf {
        super::path_parts(id).fold(self.root_dir.clone(), |path, part| path.join(part))
    }

    fn folder_path(&self, folder: &FolderId) -> Result<PathBuf> {
        let path = self.path_of(&folder.0);
        if !path.is_dir() {
            return Err(Error::NotFound(format!("Folder not found: {}", folder)));
        }
        Ok(path)
    }

    fn file_path(&self, file: &StoredFile) -> Result<PathBuf> {
        let path = self.path_of(&file.id.0);
        if !path.is_file() {
            return Err(Error::NotFound(format!("File not found: {}", file.id)));
        }
        Ok(path)
    }

    fn stored_file(parent: &FolderId, name: &str) -> StoredFile {
        StoredFile {
            id: FileId(child_id(parent, name)),
            name: name.to_string(),
            parent: parent.clone(),
        }
    }
}

fn child_id(parent: &FolderId, name: &str) -> String {
    if parent.0.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent.0, name)
    }
}

/// Reject names that would escape their folder or nest deeper
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidData(format!("Invalid name: {:?}", name)));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(Error::InvalidData(format!(
            "Name contains a path separator: {:?}",
            name
        )));
    }
    Ok(())
}

/// First free variant of `name` in `dir`: `name`, then `stem (1).ext`, `stem (2).ext`, ...
///
/// `current` is the name of the file being renamed or moved; a file never
/// collides with itself.
fn available_name(dir: &Path, name: &str, current: Option<&str>) -> String {
    let is_free = |candidate: &str| Some(candidate) == current || !dir.join(candidate).exists();
    if is_free(name) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    let mut n = 1;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if is_free(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl FileStore for LocalFileStore {
    fn name(&self) -> &str {
        "local"
    }

    fn root_folder(&self) -> Result<FolderId> {
        if !self.root_dir.is_dir() {
            return Err(Error::Store(format!(
                "Store root is not a directory: {}",
                self.root_dir.display()
            )));
        }
        Ok(FolderId(String::new()))
    }

    fn find_child_folder(&self, parent: &FolderId, name: &str) -> Result<Option<FolderId>> {
        validate_name(name)?;
        let path = self.folder_path(parent)?.join(name);
        if path.is_dir() {
            Ok(Some(FolderId(child_id(parent, name))))
        } else {
            Ok(None)
        }
    }

    fn create_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId> {
        validate_name(name)?;
        let path = self.folder_path(parent)?.join(name);
        fs::create_dir(&path).map_err(|e| {
            Error::Store(format!("Failed to create folder {}: {}", path.display(), e))
        })?;
        Ok(FolderId(child_id(parent, name)))
    }

    fn folder_name(&self, folder: &FolderId) -> Result<String> {
        self.folder_path(folder)?;
        Ok(super::path_parts(&folder.0)
            .last()
            .unwrap_or_default()
            .to_string())
    }

    fn create_file(
        &self,
        parent: &FolderId,
        name: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<StoredFile> {
        validate_name(name)?;
        let dir = self.folder_path(parent)?;
        let name = available_name(&dir, name, None);

        // Write beside the destination, then publish in one step
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(bytes)?;
        temp.flush()?;
        temp.persist_noclobber(dir.join(&name))
            .map_err(|e| Error::Store(format!("Failed to store {}: {}", name, e.error)))?;

        info!(mime_type, size = bytes.len(), "Stored file: {}", dir.join(&name).display());
        Ok(Self::stored_file(parent, &name))
    }

    fn list_files(&self, folder: &FolderId) -> Result<Vec<StoredFile>> {
        let dir = self.folder_path(folder)?;
        let mut files = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = match entry.file_name().to_str() {
                // Skip in-flight uploads
                Some(name) if !name.starts_with(".tmp") => name.to_string(),
                _ => continue,
            };
            files.push(Self::stored_file(folder, &name));
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn move_file(&self, file: &StoredFile, destination: &FolderId) -> Result<StoredFile> {
        if &file.parent == destination {
            return Ok(file.clone());
        }

        let source = self.file_path(file)?;
        let dir = self.folder_path(destination)?;
        let name = available_name(&dir, &file.name, None);
        let target = dir.join(&name);

        fs::rename(&source, &target).map_err(|e| {
            Error::Store(format!(
                "Failed to move {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;

        Ok(Self::stored_file(destination, &name))
    }

    fn rename_file(&self, file: &StoredFile, new_name: &str) -> Result<StoredFile> {
        validate_name(new_name)?;
        let source = self.file_path(file)?;
        let dir = self.folder_path(&file.parent)?;
        let name = available_name(&dir, new_name, Some(&file.name));

        if name == file.name {
            return Ok(file.clone());
        }

        fs::rename(&source, dir.join(&name)).map_err(|e| {
            Error::Store(format!("Failed to rename {}: {}", source.display(), e))
        })?;

        Ok(Self::stored_file(&file.parent, &name))
    }
}
