//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Atmos - concurrent weather and air-quality collection pipeline
#[derive(Parser, Debug)]
#[command(
    name = "atmos",
    author,
    version,
    about = "Weather and air-quality orchestration pipeline",
    long_about = "Fetches current weather and two air-quality feeds for a list of locations\n\
                  under a concurrency bound, merges them with historical records, applies\n\
                  the enrichment chain, and delivers the table to every configured sink."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ATMOS_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "ATMOS_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Directory for the daily run log (weather_run_<date>.log)
    #[arg(long, global = true, env = "ATMOS_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default filter level from -v / -q (RUST_LOG still wins)
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Prometheus port requested by the command, if any
    pub fn metrics_port(&self) -> Option<u16> {
        match &self.command {
            Commands::Run(args) if args.metrics_port != 0 => Some(args.metrics_port),
            _ => None,
        }
    }

    pub fn observability_config(&self) -> observability::ObservabilityConfig {
        observability::ObservabilityConfig {
            log_format: self.log_format.into(),
            metrics_port: self.metrics_port(),
            default_log_level: self.log_level().to_string(),
            log_dir: self.log_dir.clone(),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "ATMOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the transform chain (comma-separated, in order)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub transforms: Vec<String>,

    /// Override the maximum number of concurrent fetches
    #[arg(long, env = "ATMOS_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Override the locations (comma-separated)
    #[arg(long, value_delimiter = ',', env = "ATMOS_LOCATIONS")]
    pub locations: Vec<String>,

    /// Override the historical CSV path
    #[arg(long, env = "ATMOS_HISTORICAL_CSV")]
    pub historical: Option<PathBuf>,

    /// Validate configuration, resolve the chain and exit without fetching
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ATMOS_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate; built-in defaults when omitted
    #[arg(short, long, env = "ATMOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long, env = "ATMOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "atmos",
            "-v",
            "run",
            "--locations",
            "London,Paris",
            "--transforms",
            "kelvin_to_celsius,fill_missing",
            "--max-concurrency",
            "2",
            "--metrics-port",
            "9100",
        ])
        .unwrap();

        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.metrics_port(), Some(9100));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.locations, ["London", "Paris"]);
        assert_eq!(args.transforms, ["kelvin_to_celsius", "fill_missing"]);
        assert_eq!(args.max_concurrency, Some(2));
    }

    #[test]
    fn test_quiet_and_defaults() {
        let cli = Cli::try_parse_from(["atmos", "--quiet", "validate", "--json"]).unwrap();
        assert_eq!(cli.log_level(), "error");
        assert_eq!(cli.metrics_port(), None);
        assert!(matches!(cli.command, Commands::Validate(ValidateArgs { json: true, .. })));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["atmos", "-q", "-v", "info"]).is_err());
    }
}
