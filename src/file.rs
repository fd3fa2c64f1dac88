use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{ReorderError, StoreError};
use crate::ids::ParentContext;
use crate::session::ReorderPlan;
use crate::snapshot::SiblingRecord;
use crate::store::{MenuTree, SiblingStore};

/// Menu tree read into memory
#[derive(Debug, Clone)]
pub struct TreeContent {
    /// Path of the document
    pub path: String,
    pub tree: MenuTree,
    /// BLAKE3 hash of the raw document (hex-encoded)
    pub checksum: String,
}

/// Read a menu tree document from disk
///
/// # Arguments
/// * `path` - Path to the JSON document
///
/// # Returns
/// * `Ok(TreeContent)` - Parsed tree with the document checksum
/// * `Err(StoreError)` - File not found, I/O error, or malformed JSON
pub fn read_tree<P: AsRef<Path>>(path: P) -> Result<TreeContent, StoreError> {
    let path_ref = path.as_ref();

    if !path_ref.exists() {
        return Err(StoreError::NotFound(path_ref.display().to_string()));
    }

    let bytes = fs::read(path_ref)?;
    let checksum = blake3::hash(&bytes).to_hex().to_string();
    let tree: MenuTree = serde_json::from_slice(&bytes)?;

    Ok(TreeContent {
        path: path_ref.display().to_string(),
        tree,
        checksum,
    })
}

/// Replace the document at `path` with `tree`
///
/// The tree is written to a uniquely named temp file in the same directory
/// and renamed over the original, so readers see either the old or the new
/// document. The temp file is removed if anything fails.
pub fn write_tree<P: AsRef<Path>>(path: P, tree: &MenuTree) -> Result<(), StoreError> {
    let path_ref = path.as_ref();
    let dir = path_ref
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, tree)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path_ref).map_err(|e| e.error)?;
    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push(".lock");
    PathBuf::from(lock)
}

/// Exclusive advisory lock on `<document>.lock`, released on drop
///
/// Each acquisition opens its own handle, so threads of one process exclude
/// each other as well as separate processes.
struct DocumentLock {
    file: File,
}

impl DocumentLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(path))?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "failed to release menu document lock");
        }
    }
}

/// Sibling store backed by a JSON menu document
///
/// A commit holds an exclusive lock on `<document>.lock` while it re-reads
/// the document, validates the plan's fingerprint and replaces the file, so
/// commits from threads and processes sharing the document are serialized.
/// Reads take no lock.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SiblingStore for JsonFileStore {
    fn list_siblings(&self, parent: &ParentContext) -> Result<Vec<SiblingRecord>, StoreError> {
        let content = read_tree(&self.path)?;
        tracing::debug!(path = %content.path, checksum = %content.checksum, "read menu document");
        content.tree.siblings(parent)
    }

    fn commit_weights(&self, plan: &ReorderPlan) -> Result<(), ReorderError> {
        if !self.path.exists() {
            return Err(StoreError::NotFound(self.path.display().to_string()).into());
        }
        let _lock = DocumentLock::acquire(&self.path)?;

        let mut content = read_tree(&self.path)?;
        content.tree.apply(plan)?;
        write_tree(&self.path, &content.tree)?;
        tracing::debug!(path = %content.path, "wrote menu document");
        Ok(())
    }
}
