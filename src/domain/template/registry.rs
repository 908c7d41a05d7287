// Placeholder function registry consulted by the parser

use std::collections::BTreeSet;

/// Name of the directive resolved by the loader
pub const INCLUDE: &str = "include";

/// Functions every template engine run provides natively
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "and", "call", "html", "index", "js", "len", "not", "or", "print", "printf", "println",
    "slice", "urlquery", "eq", "ge", "gt", "le", "lt", "ne",
];

/// Closed set of function names the parser accepts.
///
/// Entries are placeholders: they only make a call syntactically valid and
/// are never invoked. `include` and the builtins are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRegistry {
    names: BTreeSet<String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            names: BTreeSet::new(),
        };
        for name in BUILTIN_FUNCTIONS {
            registry.register(*name);
        }
        registry.register(INCLUDE);
        registry
    }

    /// Registry holding the builtins plus the given names
    pub fn with_functions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(name);
        }
        registry
    }

    /// Returns false when the name was already registered
    pub fn register(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
