//! The command line interface of the budget reporter.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;

/// budget-reporter: Writes last month's Mint transactions into a new Google Sheets budget report.
///
/// Each run copies the budget report template, names the copy after today's date, and fills its
/// transactions sheet with expenses and income from the past month. Transfers are left out.
///
/// The home directory must contain `config/config.json` and the Google OAuth client credentials in
/// `config/creds.json`. On the first run you will be asked to visit a URL and paste back the
/// authorization code, after which the token is cached in `token.json`. The Mint password is read
/// from the operating system keyring, where `mintapi` stores it under the service name `mintapi`.
#[derive(Debug, Parser, Clone)]
#[command(version)]
pub struct Args {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory holding `config/`, `token.json` and, in test mode, `test.json`.
    #[arg(long, env = "BUDGET_REPORTER_HOME", default_value = ".")]
    home: PathBuf,
}

impl Args {
    pub fn new(log_level: LevelFilter, home: impl Into<PathBuf>) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["budget-reporter"]).unwrap();
        assert_eq!(LevelFilter::INFO, args.log_level());
        assert_eq!(Path::new("."), args.home());
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "budget-reporter",
            "--log-level",
            "trace",
            "--home",
            "/tmp/budget",
        ])
        .unwrap();
        assert_eq!(LevelFilter::TRACE, args.log_level());
        assert_eq!(Path::new("/tmp/budget"), args.home());
    }

    #[test]
    fn test_no_subcommands() {
        assert!(Args::try_parse_from(["budget-reporter", "sync"]).is_err());
    }
}
