//! CLI commands and argument parsing

use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental extractor for cursor-paginated REST APIs
#[derive(Parser, Debug)]
#[command(name = "notion-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Stream catalog: built-in name or YAML file
    #[arg(short, long, global = true, default_value = "notion")]
    pub connector: PathBuf,

    /// Source configuration file (JSON or YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON), rewritten as streams complete
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test connection to the API
    Check,

    /// Describe available streams
    Discover,

    /// Read records from streams
    Read {
        /// Streams to sync (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,

        /// Write messages to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail a stream on records with null or missing primary keys
        #[arg(long)]
        validate_primary_keys: bool,

        /// Ignore saved state and read everything
        #[arg(long)]
        full_refresh: bool,
    },

    /// List built-in catalogs
    List,
}

/// Split a comma-separated stream selection
pub fn parse_streams(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_read() {
        let cli = Cli::try_parse_from([
            "notion-extract",
            "read",
            "--streams",
            "pages, blocks",
            "--validate-primary-keys",
            "-C",
            "config.yaml",
            "--state",
            "state.json",
        ])
        .unwrap();

        assert_eq!(cli.connector, PathBuf::from("notion"));
        assert_eq!(cli.config, Some(PathBuf::from("config.yaml")));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Read {
                ref streams,
                validate_primary_keys,
                full_refresh,
                ..
            } => {
                assert_eq!(parse_streams(streams.as_deref()), vec!["pages", "blocks"]);
                assert!(validate_primary_keys);
                assert!(!full_refresh);
            }
            ref other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["notion-extract", "list", "-f", "pretty"]).unwrap();
        assert!(matches!(cli.command, Commands::List));
        assert_eq!(cli.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_parse_streams_empty() {
        assert!(parse_streams(None).is_empty());
        assert!(parse_streams(Some(" , ")).is_empty());
    }
}
