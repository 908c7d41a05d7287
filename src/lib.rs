extern crate clap;

pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod store;
pub mod utils;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches};

pub use config::settings::Settings;
pub use domain::template::{Definition, FunctionMode, FunctionRegistry, Resolved};
pub use error::{LoadError, ParseError, ParseErrorKind};
pub use services::loader::{load, Loader};
pub use store::{FileStore, MemoryFileStore, OsFileStore};

// Command line definition for the itpl binary
pub fn cli() -> clap::Command {
    clap::Command::new("itpl")
        .about("Resolve {{include}} directives into a single template")
        .arg(
            Arg::new("entry")
                .value_name("ENTRY")
                .help("Template file to start from")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG")
                .help("Path to a YAML settings file (defaults to itpl.yml when present)"),
        )
        .arg(
            Arg::new("function")
                .short('f')
                .long("function")
                .value_name("NAME")
                .action(ArgAction::Append)
                .help("Function name to accept; disables discovery"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT")
                .help("Write the result to this file instead of stdout"),
        )
        .arg(
            Arg::new("parse_comments")
                .long("parse-comments")
                .action(ArgAction::SetTrue)
                .help("Keep {{/* */}} comments in the output"),
        )
        .arg(
            Arg::new("max_attempts")
                .long("max-attempts")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Parse attempts per file while discovering functions"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Log more (repeat for trace output)"),
        )
}

/// Settings given on the command line
pub fn settings_from_matches(matches: &ArgMatches) -> Settings {
    Settings {
        functions: matches
            .get_many::<String>("function")
            .map(|names| names.cloned().collect())
            .unwrap_or_default(),
        max_discovery_attempts: matches.get_one::<usize>("max_attempts").copied(),
        parse_comments: matches.get_flag("parse_comments").then_some(true),
        output: matches.get_one::<String>("output").map(PathBuf::from),
    }
}

/// Load the entry file named on the command line and write the result
pub fn run(matches: &ArgMatches) -> Result<()> {
    let entry = matches
        .get_one::<String>("entry")
        .context("Missing entry template")?;
    let config_path = matches.get_one::<String>("config").map(Path::new);

    let settings = Settings::read(config_path)?.merge(settings_from_matches(matches));
    let loader = settings.configure(Loader::new());

    let template = loader
        .load(entry)
        .with_context(|| format!("Failed to load template {}", entry))?;

    match &settings.output {
        Some(path) => std::fs::write(path, template)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", template),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_cli_flags_to_settings() {
        let matches = cli().get_matches_from([
            "itpl",
            "page.tmpl",
            "-f",
            "t",
            "--function",
            "asset",
            "--max-attempts",
            "7",
            "--parse-comments",
            "-o",
            "out.tmpl",
        ]);
        let settings = settings_from_matches(&matches);
        assert_eq!(settings.functions, vec!["t", "asset"]);
        assert_eq!(settings.max_discovery_attempts, Some(7));
        assert_eq!(settings.parse_comments, Some(true));
        assert_eq!(settings.output, Some(PathBuf::from("out.tmpl")));
    }

    #[test]
    fn test_cli_defaults_leave_settings_unset() {
        let matches = cli().get_matches_from(["itpl", "page.tmpl"]);
        assert_eq!(settings_from_matches(&matches), Settings::default());
        assert_eq!(matches.get_count("verbose"), 0);
    }

    #[test]
    fn test_cli_requires_entry() {
        assert!(cli().try_get_matches_from(["itpl"]).is_err());
    }

    #[test]
    fn test_run_writes_output_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("page.tmpl"), r#"<p>{{include "part.tmpl"}}</p>"#).unwrap();
        std::fs::write(dir.path().join("part.tmpl"), "{{t .title}}").unwrap();
        let config = dir.path().join("settings.yml");
        std::fs::write(&config, "functions: [t]\n").unwrap();
        let output = dir.path().join("out.tmpl");

        let args: Vec<OsString> = vec![
            "itpl".into(),
            dir.path().join("page.tmpl").into(),
            "-c".into(),
            config.clone().into(),
            "-o".into(),
            output.clone().into(),
        ];
        let matches = cli().get_matches_from(args);
        run(&matches).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "<p>{{t .title}}</p>");
    }

    #[test]
    fn test_run_reports_load_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("page.tmpl"), r#"{{include "gone"}}"#).unwrap();
        let config = dir.path().join("settings.yml");
        std::fs::write(&config, "{}\n").unwrap();

        let args: Vec<OsString> = vec![
            "itpl".into(),
            dir.path().join("page.tmpl").into(),
            "-c".into(),
            config.into(),
        ];
        let matches = cli().get_matches_from(args);
        let err = run(&matches).unwrap_err();
        assert!(err.to_string().starts_with("Failed to load template"));
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::NotFound { .. })
        ));
    }
}
