//! CLI argument definitions.

use super::validators::parse_point;
use crate::region::Point;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scene-based stream orchestration and alarm debounce service.
#[derive(Debug, Parser)]
#[command(name = "scenewatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "SCENEWATCH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the service until interrupted.
    Serve {
        /// TOML file with `[[scenes]]` to deploy at startup.
        #[arg(long)]
        scenes: Option<PathBuf>,
    },
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check whether a point passes a region filter.
    Region {
        /// Region string, e.g. "(0,0),(10,0),(10,10),(0,10)".
        #[arg(long, allow_hyphen_values = true)]
        area: String,
        /// Point to test as X,Y.
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: Point,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_region_args() {
        let cli = Cli::try_parse_from([
            "scenewatch",
            "region",
            "--area",
            "(0,0),(10,0),(10,10)",
            "--point",
            "2.5,1",
        ])
        .unwrap();
        match cli.command {
            Command::Region { area, point } => {
                assert_eq!(area, "(0,0),(10,0),(10,10)");
                assert_eq!(point, Point::new(2.5, 1.0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["scenewatch", "config", "path", "-vv", "--config", "x.toml"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["scenewatch", "-q", "-v", "config", "show"]).is_err());
    }
}
