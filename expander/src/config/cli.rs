//! Command-line arguments.

use clap::{ArgAction, CommandFactory, Parser};
use std::path::PathBuf;

use crate::config::settings::Settings;

/// Command-line arguments for the expander.
///
/// Help and version are plain flags handled by `main`: help exits with
/// status 1 and version with status 0. Ring position values are kept as text
/// so that malformed numbers are reported by configuration validation.
#[derive(Debug, Default, Parser)]
#[command(
    name = "expander",
    about = "Consumes object change commands from this node's vnode queues and indexes them",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// A configuration file to use
    #[arg(short = 'c', long = "config", value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// The slot this node will occupy in the ring
    #[arg(short = 'i', long = "index", value_name = "INDEX")]
    pub index: Option<String>,

    /// The number of nodes in the ring
    #[arg(short = 'n', long = "node-count", value_name = "NUMBER")]
    pub node_count: Option<String>,

    /// Set the log level
    #[arg(short = 'l', long = "log-level", value_name = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Show this message
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    /// Show the version and exit
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue)]
    pub version: bool,
}

impl Cli {
    /// Usage text printed for `--help`.
    pub fn usage() -> String {
        format!(
            "expander {}\n\n{}",
            env!("CARGO_PKG_VERSION"),
            Self::command().render_help()
        )
    }

    /// The settings given on the command line.
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::new();
        if let Some(config) = &self.config {
            settings.set("config_file", config.display().to_string());
        }
        if let Some(index) = &self.index {
            settings.set("index", index.clone());
        }
        if let Some(node_count) = &self.node_count {
            settings.set("node_count", node_count.clone());
        }
        if let Some(log_level) = &self.log_level {
            settings.set("log_level", log_level.clone());
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "expander", "-c", "/tmp/expander.toml", "-i", "2", "-n", "5", "-l", "debug",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/expander.toml")));
        assert_eq!(cli.index.as_deref(), Some("2"));
        assert_eq!(cli.node_count.as_deref(), Some("5"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(!cli.help);
        assert!(!cli.version);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from(["expander", "--index", "1", "--node-count", "3"]).unwrap();
        assert_eq!(cli.index.as_deref(), Some("1"));
        assert_eq!(cli.node_count.as_deref(), Some("3"));
    }

    #[test]
    fn test_help_and_version_are_flags() {
        assert!(Cli::try_parse_from(["expander", "-h"]).unwrap().help);
        assert!(Cli::try_parse_from(["expander", "--version"]).unwrap().version);
    }

    #[test]
    fn test_non_numeric_index_is_left_to_validation() {
        let cli = Cli::try_parse_from(["expander", "-i", "first"]).unwrap();
        assert_eq!(cli.to_settings().get("index"), Some("first"));
    }

    #[test]
    fn test_only_given_flags_become_settings() {
        let cli = Cli::try_parse_from(["expander", "-n", "23"]).unwrap();
        let settings = cli.to_settings();
        assert_eq!(settings.get("node_count"), Some("23"));
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn test_usage_mentions_flags() {
        let usage = Cli::usage();
        assert!(usage.starts_with("expander "));
        assert!(usage.contains("--node-count"));
    }
}
