// File stores the loader reads templates from

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::utils::clean;

/// Source of template files.
///
/// A given cleaned path must denote the same content for the duration of one
/// `Loader::load` call.
pub trait FileStore: Send + Sync {
    /// Read the whole file. Missing files are reported with
    /// `io::ErrorKind::NotFound`.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct OsFileStore;

impl OsFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for OsFileStore {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// In-memory file map, keyed by cleaned path
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files.insert(clean(path.as_ref()), content.into());
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<P, C> FromIterator<(P, C)> for MemoryFileStore
where
    P: AsRef<Path>,
    C: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (path, content) in iter {
            store.insert(path, content);
        }
        store
    }
}

impl FileStore for MemoryFileStore {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.get(&clean(path)).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: file does not exist", path.display()),
            )
        })
    }
}
