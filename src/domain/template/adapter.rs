// Syntax adapter: parses templates whose functions are unknown ahead of time

use std::path::Path;

use tracing::{debug, trace};

use super::ast::TreeSet;
use super::parser::TemplateParser;
use super::registry::FunctionRegistry;
use crate::error::LoadError;

/// Parse attempts allowed while discovering function names
pub const DEFAULT_MAX_DISCOVERY_ATTEMPTS: usize = 100;

/// How the parser learns which function names are valid
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionMode {
    /// Start from the builtins and register every undefined function the
    /// parser reports, retrying up to `max_attempts` parses per file.
    Discover { max_attempts: usize },
    /// Accept exactly these names; an unknown function is a syntax error.
    Explicit(FunctionRegistry),
}

impl Default for FunctionMode {
    fn default() -> Self {
        FunctionMode::Discover {
            max_attempts: DEFAULT_MAX_DISCOVERY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntaxAdapter {
    mode: FunctionMode,
    parse_comments: bool,
}

impl SyntaxAdapter {
    pub fn new(mode: FunctionMode) -> Self {
        Self {
            mode,
            parse_comments: false,
        }
    }

    pub fn with_comments(mut self, keep: bool) -> Self {
        self.parse_comments = keep;
        self
    }

    pub fn mode(&self) -> &FunctionMode {
        &self.mode
    }

    pub fn mode_mut(&mut self) -> &mut FunctionMode {
        &mut self.mode
    }

    pub fn parse_comments(&self) -> bool {
        self.parse_comments
    }

    /// Parse one file's text.
    ///
    /// In discovery mode `discovered` carries the names learned so far in the
    /// current load and is extended with every new placeholder.
    pub fn parse(
        &self,
        path: &Path,
        text: &str,
        discovered: &mut FunctionRegistry,
    ) -> Result<TreeSet, LoadError> {
        let name = path.display().to_string();
        match &self.mode {
            FunctionMode::Explicit(functions) => self
                .parser(&name, functions)
                .parse(text)
                .map_err(|source| LoadError::Syntax {
                    path: path.to_path_buf(),
                    source,
                }),
            FunctionMode::Discover { max_attempts } => {
                self.discover(path, &name, text, discovered, *max_attempts)
            }
        }
    }

    fn discover(
        &self,
        path: &Path,
        name: &str,
        text: &str,
        functions: &mut FunctionRegistry,
        max_attempts: usize,
    ) -> Result<TreeSet, LoadError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            trace!(path = %path.display(), attempt, "parsing template");
            let source = match self.parser(name, functions).parse(text) {
                Ok(trees) => return Ok(trees),
                Err(err) => err,
            };
            let Some(function) = source.undefined_function() else {
                return Err(LoadError::Syntax {
                    path: path.to_path_buf(),
                    source,
                });
            };
            if attempt >= max_attempts {
                return Err(LoadError::UnresolvableFunction {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source,
                });
            }
            debug!(path = %path.display(), function, "registering placeholder function");
            functions.register(function);
        }
    }

    fn parser<'a>(&self, name: &str, functions: &'a FunctionRegistry) -> TemplateParser<'a> {
        TemplateParser::new(name, functions).parse_comments(self.parse_comments)
    }
}
