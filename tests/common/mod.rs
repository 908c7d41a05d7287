// Common test utilities shared across test files

use itpl::{LoadError, Loader, MemoryFileStore};

/// Entry file every in-memory fixture is loaded from
#[allow(dead_code)]
pub const ENTRY: &str = "/entry";

/// Build an in-memory store from (path, content) pairs
#[allow(dead_code)]
pub fn store(files: &[(&str, &str)]) -> MemoryFileStore {
    files.iter().copied().collect()
}

/// Load `/entry` from the given files with default settings
#[allow(dead_code)]
pub fn load_files(files: &[(&str, &str)]) -> Result<String, LoadError> {
    Loader::with_store(store(files)).load(ENTRY)
}
