//! CLI argument parsing for dv

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dv")]
#[command(author, version, about = "Drakvuf sandbox task manager", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a sample, wait for the sandbox and print its report
    Analyze {
        /// Sample to analyze
        #[arg(required = true)]
        file: PathBuf,

        /// Name to submit the sample under (default: the file's name)
        #[arg(short, long)]
        name: Option<String>,

        /// Seconds between status checks
        #[arg(short, long, default_value_t = crate::DEFAULT_POLL_INTERVAL_SECS)]
        interval: u64,

        /// Seconds to wait before giving up
        #[arg(short, long, default_value_t = crate::DEFAULT_POLL_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Decode a result document
    Decode {
        /// Path to a drakvuf.log result file
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Print the task id a sample would get
    Identify {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze_defaults() {
        let cli = Cli::parse_from(["dv", "analyze", "sample.exe"]);
        match cli.command {
            Command::Analyze {
                file,
                name,
                interval,
                timeout,
            } => {
                assert_eq!(file, PathBuf::from("sample.exe"));
                assert!(name.is_none());
                assert_eq!(interval, 5);
                assert_eq!(timeout, 600);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dv", "decode", "drakvuf.log", "--log-level", "debug", "-c", "dv.yml"]);
        assert!(matches!(cli.command, Command::Decode { .. }));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("dv.yml")));
    }
}
