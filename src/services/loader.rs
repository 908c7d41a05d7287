// Loader service - turns an entry file into one self-contained template

use std::path::Path;

use crate::{
    domain::template::{
        FunctionMode, FunctionRegistry, IncludeResolver, Resolved, SyntaxAdapter,
        DEFAULT_MAX_DISCOVERY_ATTEMPTS,
    },
    error::LoadError,
    store::{FileStore, OsFileStore},
};

/// Resolves includes starting from an entry file.
///
/// A loader holds configuration only. Each call to [`Loader::load`] gets its
/// own set of in-flight files and discovered functions, so one loader can be
/// shared between threads.
pub struct Loader {
    store: Box<dyn FileStore>,
    adapter: SyntaxAdapter,
}

impl Loader {
    /// Loader over the local filesystem with function discovery
    pub fn new() -> Self {
        Self::with_store(OsFileStore::new())
    }

    pub fn with_store(store: impl FileStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            adapter: SyntaxAdapter::default(),
        }
    }

    pub fn store(mut self, store: impl FileStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Accept exactly these function names (plus the builtins and `include`)
    /// instead of discovering them.
    pub fn functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.adapter.mode_mut() = FunctionMode::Explicit(FunctionRegistry::with_functions(names));
        self
    }

    /// Parse attempts allowed per file while discovering functions.
    /// Switches back to discovery if explicit functions were set.
    pub fn max_discovery_attempts(mut self, max_attempts: usize) -> Self {
        *self.adapter.mode_mut() = FunctionMode::Discover {
            max_attempts: max_attempts.max(1),
        };
        self
    }

    /// Keep `{{/* */}}` comments in the output
    pub fn parse_comments(mut self, keep: bool) -> Self {
        self.adapter = self.adapter.with_comments(keep);
        self
    }

    pub fn function_mode(&self) -> &FunctionMode {
        self.adapter.mode()
    }

    /// Load `path` and return the combined template source
    pub fn load(&self, path: impl AsRef<Path>) -> Result<String, LoadError> {
        Ok(self.load_template(path)?.to_template_string())
    }

    /// Load `path` keeping the body and the named sub-templates apart
    pub fn load_template(&self, path: impl AsRef<Path>) -> Result<Resolved, LoadError> {
        let path = path.as_ref();
        tracing::debug!(entry = %path.display(), "loading template");
        IncludeResolver::new(self.store.as_ref(), &self.adapter).resolve_entry(path)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

/// Load `path` from the local filesystem with function discovery
pub fn load(path: impl AsRef<Path>) -> Result<String, LoadError> {
    Loader::new().load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFileStore;

    #[test]
    fn test_builder_switches_function_mode() {
        let loader = Loader::with_store(MemoryFileStore::new());
        assert_eq!(
            loader.function_mode(),
            &FunctionMode::Discover {
                max_attempts: DEFAULT_MAX_DISCOVERY_ATTEMPTS
            }
        );

        let loader = loader.functions(["asset"]);
        assert!(matches!(loader.function_mode(), FunctionMode::Explicit(registry) if registry.contains("asset")));

        let loader = loader.max_discovery_attempts(5);
        assert_eq!(loader.function_mode(), &FunctionMode::Discover { max_attempts: 5 });
    }

    #[test]
    fn test_loader_is_reusable() {
        let store = MemoryFileStore::new()
            .with_file("/a", r#"A{{include "b"}}"#)
            .with_file("/b", "B");
        let loader = Loader::with_store(store);
        assert_eq!(loader.load("/a").unwrap(), "AB");
        assert_eq!(loader.load("/a").unwrap(), "AB");
        assert_eq!(loader.load("/b").unwrap(), "B");
    }

    #[test]
    fn test_loader_shared_across_threads() {
        let store = MemoryFileStore::new()
            .with_file("/a", r#"{{include "b"}}{{upper .x}}"#)
            .with_file("/b", "B");
        let loader = Loader::with_store(store);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| loader.load("/a"))).collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap().unwrap(), "B{{upper .x}}");
            }
        });
    }

    #[test]
    fn test_comments_kept_when_enabled() {
        let store = MemoryFileStore::new().with_file("/a", "{{/* note */}}x");
        let loader = Loader::with_store(store);
        assert_eq!(loader.load("/a").unwrap(), "x");
        let loader = loader.parse_comments(true);
        assert_eq!(loader.load("/a").unwrap(), "{{/* note */}}x");
    }
}
