//! Persistence of rendered artefacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A named blob to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl StoredFile {
    pub fn new(name: impl Into<String>, mime_type: &'static str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            data: data.into(),
        }
    }
}

/// Persists named blobs into a destination directory.
pub trait DocumentStore {
    /// Store every file under `dir` and return the stored paths, in order.
    fn persist(&self, dir: &Path, files: &[StoredFile]) -> io::Result<Vec<PathBuf>>;
}

/// Writes files straight into the destination directory, creating it and
/// overwriting existing files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryStore;

impl DocumentStore for DirectoryStore {
    fn persist(&self, dir: &Path, files: &[StoredFile]) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let path = dir.join(&file.name);
            fs::write(&path, &file.data)?;
            log::debug!("saved {} ({}, {} bytes)", path.display(), file.mime_type, file.data.len());
            stored.push(path);
        }
        Ok(stored)
    }
}
