// Include resolution for one top-level load

use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::adapter::SyntaxAdapter;
use super::registry::FunctionRegistry;
use super::serializer::{define, serialize_list};
use super::walker::{walk, ResolveInclude};
use crate::error::LoadError;
use crate::store::FileStore;
use crate::utils::{clean, join_relative};

/// A named sub-template collected during a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub body: String,
    /// File the definition was first read from
    pub source: PathBuf,
}

/// Output of a load: the entry file's body and every named sub-template
/// found in it or in any file it includes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolved {
    pub body: String,
    pub definitions: Vec<Definition>,
}

impl Resolved {
    /// Combined template text: the body followed by one `define` per sub-template
    pub fn to_template_string(&self) -> String {
        let mut out = self.body.clone();
        for definition in &self.definitions {
            out.push_str(&define(&definition.name, &definition.body));
        }
        out
    }
}

impl std::fmt::Display for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_template_string())
    }
}

/// Loads files and splices includes for a single top-level call.
///
/// Holds the stack of files currently being resolved, so each top-level
/// call must use its own resolver.
pub struct IncludeResolver<'a> {
    store: &'a dyn FileStore,
    adapter: &'a SyntaxAdapter,
    in_flight: Vec<PathBuf>,
    functions: FunctionRegistry,
    definitions: Vec<Definition>,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(store: &'a dyn FileStore, adapter: &'a SyntaxAdapter) -> Self {
        Self {
            store,
            adapter,
            in_flight: Vec::new(),
            functions: FunctionRegistry::new(),
            definitions: Vec::new(),
        }
    }

    /// Resolve `path` and everything it includes
    pub fn resolve_entry(mut self, path: &Path) -> Result<Resolved, LoadError> {
        let body = self.load_file(path)?;
        Ok(Resolved {
            body,
            definitions: self.definitions,
        })
    }

    /// Run the whole pipeline on one file and return its top-level body.
    /// Named sub-templates are collected on the resolver.
    fn load_file(&mut self, path: &Path) -> Result<String, LoadError> {
        let path = clean(path);
        if self.in_flight.contains(&path) {
            return Err(LoadError::CircularImport {
                chain: self.in_flight.clone(),
                path,
            });
        }
        let mut scope = InFlight::enter(self, path.clone());
        scope.process(&path)
    }

    fn process(&mut self, path: &Path) -> Result<String, LoadError> {
        let text = self.read(path)?;
        let trees = self.adapter.parse(path, &text, &mut self.functions)?;
        let mut body = String::new();
        for mut tree in trees {
            walk(path, &mut tree.root, self)?;
            let text = serialize_list(&tree.root);
            if tree.is_root() {
                body = text;
            } else {
                self.add_definition(path, tree.name, text)?;
            }
        }
        Ok(body)
    }

    fn read(&self, path: &Path) -> Result<String, LoadError> {
        let bytes = self.store.read_file(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                LoadError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        String::from_utf8(bytes).map_err(|err| LoadError::Read {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })
    }

    fn add_definition(&mut self, path: &Path, name: String, body: String) -> Result<(), LoadError> {
        let Some(index) = self.definitions.iter().position(|d| d.name == name) else {
            self.definitions.push(Definition {
                name,
                body,
                source: path.to_path_buf(),
            });
            return Ok(());
        };
        let existing = &mut self.definitions[index];
        if existing.body == body || body.trim().is_empty() {
            debug!(name = %name, file = %path.display(), "skipping repeated definition");
            return Ok(());
        }
        // an empty definition is a placeholder the real one may replace
        if existing.body.trim().is_empty() {
            existing.body = body;
            existing.source = path.to_path_buf();
            return Ok(());
        }
        Err(LoadError::DuplicateDefinition {
            name,
            path: path.to_path_buf(),
        })
    }
}

impl ResolveInclude for IncludeResolver<'_> {
    fn resolve(&mut self, including_file: &Path, target: &str) -> Result<String, LoadError> {
        let path = join_relative(including_file, target);
        debug!(
            from = %including_file.display(),
            target,
            resolved = %path.display(),
            "resolving include"
        );
        self.load_file(&path)
    }
}

/// Marks a file as being resolved until dropped
struct InFlight<'r, 'a> {
    resolver: &'r mut IncludeResolver<'a>,
}

impl<'r, 'a> InFlight<'r, 'a> {
    fn enter(resolver: &'r mut IncludeResolver<'a>, path: PathBuf) -> Self {
        resolver.in_flight.push(path);
        Self { resolver }
    }
}

impl Drop for InFlight<'_, '_> {
    fn drop(&mut self) {
        self.resolver.in_flight.pop();
    }
}

impl<'a> Deref for InFlight<'_, 'a> {
    type Target = IncludeResolver<'a>;

    fn deref(&self) -> &Self::Target {
        &*self.resolver
    }
}

impl DerefMut for InFlight<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.resolver
    }
}
