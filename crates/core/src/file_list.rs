//! File references and the file-list store
//!
//! A [`FileRef`] names a PDF either on disk or in memory. Saving an annotated
//! page produces a new in-memory `FileRef` that takes the original's place
//! in whatever [`FileStore`] the editor was given.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// Identity of a file entry; two refs are the same file only if their ids
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the file bytes live.
#[derive(Debug, Clone)]
pub enum FileLocation {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A file entry as held in the file list.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub id: FileId,
    pub location: FileLocation,
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub mime_type: String,
    pub last_modified: SystemTime,
}

impl FileRef {
    /// Reference a file on disk, reading its size and modification time.
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            id: FileId::new(),
            location: FileLocation::Path(path.to_path_buf()),
            name,
            size: metadata.len(),
            mime_type: PDF_MIME_TYPE.to_owned(),
            last_modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: FileId::new(),
            size: bytes.len() as u64,
            location: FileLocation::Memory(Arc::from(bytes)),
            name: name.into(),
            mime_type: PDF_MIME_TYPE.to_owned(),
            last_modified: SystemTime::now(),
        }
    }

    /// Fetch the full file contents.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        match &self.location {
            FileLocation::Path(path) => fs::read(path),
            FileLocation::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// A new file entry holding `bytes`, keeping this file's name, MIME type
    /// and modification time.
    pub fn with_contents(&self, bytes: Vec<u8>) -> Self {
        Self {
            id: FileId::new(),
            size: bytes.len() as u64,
            location: FileLocation::Memory(Arc::from(bytes)),
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// Capability to swap one file entry for another.
pub trait FileStore {
    /// Replace `old` (matched by id) with `new` at the same position.
    /// Returns that position, or `None` when `old` is not in the store.
    fn replace(&mut self, old: &FileRef, new: FileRef) -> Option<usize>;
}

/// Ordered in-memory file list.
#[derive(Debug, Default, Clone)]
pub struct FileList {
    files: Vec<FileRef>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: FileRef) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[FileRef] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn index_of(&self, id: FileId) -> Option<usize> {
        self.files.iter().position(|file| file.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&FileRef> {
        self.files.get(index)
    }

    pub fn remove(&mut self, id: FileId) -> Option<FileRef> {
        let index = self.index_of(id)?;
        Some(self.files.remove(index))
    }
}

impl FileStore for FileList {
    fn replace(&mut self, old: &FileRef, new: FileRef) -> Option<usize> {
        let index = self.index_of(old.id)?;
        self.files[index] = new;
        Some(index)
    }
}
