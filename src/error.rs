// Error handling for itpl

use std::path::PathBuf;
use thiserror::Error;

/// Why a template failed to parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The template calls a function the parser was not told about
    #[error("function {0:?} not defined")]
    UndefinedFunction(String),

    #[error("{0}")]
    Syntax(String),
}

/// Parse failure located at a line of a named template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("template: {name}:{line}: {kind}")]
pub struct ParseError {
    pub name: String,
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn undefined_function(&self) -> Option<&str> {
        match &self.kind {
            ParseErrorKind::UndefinedFunction(name) => Some(name),
            ParseErrorKind::Syntax(_) => None,
        }
    }
}

/// Failure of a whole `Loader::load` call
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("template not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(
        "unresolvable functions in {}: still failing after {attempts} parse attempts: {source}",
        path.display()
    )]
    UnresolvableFunction {
        path: PathBuf,
        attempts: usize,
        #[source]
        source: ParseError,
    },

    #[error("circular import detected: {:?} is already being processed", path)]
    CircularImport {
        path: PathBuf,
        /// Files in flight when the cycle was found, outermost first
        chain: Vec<PathBuf>,
    },

    #[error("multiple definition of template {name:?} (again in {})", path.display())]
    DuplicateDefinition { name: String, path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError {
            name: "page.tpl".to_string(),
            line: 3,
            kind: ParseErrorKind::UndefinedFunction("upper".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "template: page.tpl:3: function \"upper\" not defined"
        );
        assert_eq!(err.undefined_function(), Some("upper"));
    }

    #[test]
    fn test_circular_import_names_path() {
        let err = LoadError::CircularImport {
            path: PathBuf::from("/a"),
            chain: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        assert_eq!(
            err.to_string(),
            "circular import detected: \"/a\" is already being processed"
        );
    }
}
