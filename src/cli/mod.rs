//! CLI interface for hl-tape
//!
//! Provides subcommands for:
//! - `lags`: Compute lag features for a quote file
//! - `query`: Fetch rows from the analytics database
//! - `replay`: Read replay logs from a backtest run
//! - `overlay`: Build the theo overlay for a coin
//! - `config`: Show the effective configuration

mod lags;
mod overlay;
mod query;
mod replay;

pub use lags::LagsArgs;
pub use overlay::OverlayArgs;
pub use query::QueryArgs;
pub use replay::ReplayArgs;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;

#[derive(Parser, Debug)]
#[command(name = "hl-tape")]
#[command(about = "Analytics helpers for Hyperliquid trading activity")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute lag features for a quote file
    Lags(LagsArgs),
    /// Fetch rows from the analytics database
    Query(QueryArgs),
    /// Read replay logs
    Replay(ReplayArgs),
    /// Build the theo overlay
    Overlay(OverlayArgs),
    /// Show configuration
    Config,
}

/// Write rows to stdout as JSON lines
pub(crate) fn print_json_lines<T: Serialize>(rows: &[T]) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lags_command() {
        let cli = Cli::try_parse_from([
            "hl-tape", "lags", "quotes.jsonl", "--lag", "1s", "--lag", "5m", "-o", "out.parquet",
        ])
        .unwrap();
        assert_eq!(cli.config, "config.toml");
        match cli.command {
            Commands::Lags(args) => {
                assert_eq!(args.lags, vec!["1s", "5m"]);
                assert_eq!(args.output.unwrap().to_str(), Some("out.parquet"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_command() {
        let cli = Cli::try_parse_from([
            "hl-tape",
            "query",
            "--sql-only",
            "trades",
            "--start",
            "2025-01-04 00:00:00",
            "--end",
            "2025-01-05T00:00:00Z",
            "--coin",
            "BTC",
            "--twap",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Query(ref q) if q.sql_only));
    }

    #[test]
    fn test_rejects_bad_time() {
        let result = Cli::try_parse_from([
            "hl-tape", "query", "tobs", "--start", "yesterday", "--end", "today",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_config_command() {
        let cli = Cli::try_parse_from(["hl-tape", "-c", "other.toml", "config"]).unwrap();
        assert_eq!(cli.config, "other.toml");
        assert!(matches!(cli.command, Commands::Config));
    }
}
