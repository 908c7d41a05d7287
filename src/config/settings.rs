use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::template::DEFAULT_MAX_DISCOVERY_ATTEMPTS;
use crate::services::loader::Loader;

/// Settings file read when no `--config` is given and the file exists
pub const DEFAULT_CONFIG_FILE: &str = "itpl.yml";

#[derive(Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    /// Function names to accept. When empty, names are discovered.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discovery_attempts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_comments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Settings {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse settings")
    }

    /// Read settings from `path`, or from `itpl.yml` if it exists when no
    /// path is given. Missing default file means default settings.
    pub fn read(path: Option<&Path>) -> Result<Self> {
        Self::read_or_default(path, Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Read `path`, falling back to `default_file` only when it exists
    pub fn read_or_default(path: Option<&Path>, default_file: &Path) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None if default_file.is_file() => default_file,
            None => return Ok(Self::default()),
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// Layer `other` on top of these settings; values set in `other` win
    pub fn merge(mut self, other: Settings) -> Self {
        if !other.functions.is_empty() {
            self.functions = other.functions;
        }
        self.max_discovery_attempts = other.max_discovery_attempts.or(self.max_discovery_attempts);
        self.parse_comments = other.parse_comments.or(self.parse_comments);
        self.output = other.output.or(self.output);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_discovery_attempts
            .unwrap_or(DEFAULT_MAX_DISCOVERY_ATTEMPTS)
    }

    /// Apply these settings to a loader
    pub fn configure(&self, loader: Loader) -> Loader {
        let loader = loader.parse_comments(self.parse_comments.unwrap_or(false));
        if self.functions.is_empty() {
            loader.max_discovery_attempts(self.max_attempts())
        } else {
            loader.functions(self.functions.iter().cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::FunctionMode;
    use crate::store::MemoryFileStore;

    #[test]
    fn test_serde() {
        let settings = Settings {
            functions: vec!["asset".to_string()],
            max_discovery_attempts: Some(10),
            parse_comments: Some(true),
            output: Some(PathBuf::from("out.tmpl")),
        };

        let yml = serde_yaml::to_string(&settings).unwrap();
        let deserde: Settings = serde_yaml::from_str(&yml).unwrap();
        assert_eq!(settings, deserde);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Settings::from_yaml("{}").unwrap(), Settings::default());
        assert_eq!(Settings::default().max_attempts(), 100);
    }

    #[test]
    fn test_partial_yaml() {
        let settings = Settings::from_yaml("functions: [t, asset]\nparse_comments: true\n").unwrap();
        assert_eq!(settings.functions, vec!["t", "asset"]);
        assert_eq!(settings.parse_comments, Some(true));
        assert_eq!(settings.max_discovery_attempts, None);
    }

    #[test]
    fn test_unknown_field_type_is_error() {
        assert!(Settings::from_yaml("max_discovery_attempts: lots").is_err());
    }

    #[test]
    fn test_skip_none_fields_in_yaml() {
        let yml = serde_yaml::to_string(&Settings::default()).unwrap();

        assert!(!yml.contains("functions:"));
        assert!(!yml.contains("max_discovery_attempts:"));
        assert!(!yml.contains("parse_comments:"));
        assert!(!yml.contains("output:"));
    }

    #[test]
    fn test_skip_none_fields_in_json() {
        let settings = Settings {
            parse_comments: Some(false),
            ..Settings::default()
        };

        let json = serde_json::to_string(&settings).unwrap();

        assert!(json.contains("\"parse_comments\""));
        assert!(!json.contains("\"functions\""));
        assert!(!json.contains("\"output\""));
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = Settings {
            functions: vec!["a".to_string()],
            max_discovery_attempts: Some(3),
            parse_comments: Some(true),
            output: None,
        };
        let flags = Settings {
            max_discovery_attempts: Some(7),
            output: Some(PathBuf::from("o")),
            ..Settings::default()
        };
        let merged = file.merge(flags);
        assert_eq!(merged.functions, vec!["a"]);
        assert_eq!(merged.max_discovery_attempts, Some(7));
        assert_eq!(merged.parse_comments, Some(true));
        assert_eq!(merged.output, Some(PathBuf::from("o")));
    }

    #[test]
    fn test_configure_loader() {
        let loader = Settings::default().configure(Loader::with_store(MemoryFileStore::new()));
        assert_eq!(loader.function_mode(), &FunctionMode::Discover { max_attempts: 100 });

        let settings = Settings {
            functions: vec!["asset".to_string()],
            ..Settings::default()
        };
        let loader = settings.configure(Loader::with_store(MemoryFileStore::new()));
        assert!(matches!(loader.function_mode(), FunctionMode::Explicit(_)));
    }

    #[test]
    fn test_read_default_file_only_when_present() {
        let dir = tempfile::TempDir::new().unwrap();
        let default_file = dir.path().join(DEFAULT_CONFIG_FILE);
        assert_eq!(
            Settings::read_or_default(None, &default_file).unwrap(),
            Settings::default()
        );

        std::fs::write(&default_file, "parse_comments: true\n").unwrap();
        let settings = Settings::read_or_default(None, &default_file).unwrap();
        assert_eq!(settings.parse_comments, Some(true));

        let explicit = dir.path().join("other.yml");
        std::fs::write(&explicit, "max_discovery_attempts: 4\n").unwrap();
        let settings = Settings::read_or_default(Some(&explicit), &default_file).unwrap();
        assert_eq!(settings.max_discovery_attempts, Some(4));
        assert_eq!(settings.parse_comments, None);
    }

    #[test]
    fn test_read_missing_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.yml");
        assert!(Settings::read(Some(&missing)).is_err());
    }
}
