//! Replay command implementation

use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::print_json_lines;
use crate::config::Config;
use crate::replay::ReplayReader;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Replay directory; defaults to [replay] directory in config
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Row cap per file; defaults to [replay] max_rows in config
    #[arg(long)]
    pub max_rows: Option<usize>,

    #[command(subcommand)]
    pub log: ReplayLog,
}

#[derive(Subcommand, Debug)]
pub enum ReplayLog {
    /// Fills from fills.jsonl
    Fills {
        #[arg(long = "coin")]
        coins: Vec<String>,
    },
    /// Orders from orders.jsonl
    Orders {
        #[arg(long = "coin")]
        coins: Vec<String>,
        /// Join order_meta.jsonl on cloid
        #[arg(long)]
        meta: bool,
    },
    /// Strategy state from strategy_info.jsonl
    StrategyInfo {
        #[arg(long = "name")]
        names: Vec<String>,
    },
    /// Theos from theo.jsonl
    Theos {
        #[arg(long = "coin")]
        coins: Vec<String>,
    },
    /// Websocket requests from ws_request.jsonl
    WsRequests,
}

impl ReplayArgs {
    pub fn reader(&self, config: &Config) -> ReplayReader {
        let mut reader = ReplayReader::from_config(&config.replay);
        if let Some(dir) = &self.dir {
            reader = ReplayReader::new(dir.clone()).with_max_rows(reader.max_rows());
        }
        if let Some(max_rows) = self.max_rows {
            reader = reader.with_max_rows(max_rows);
        }
        reader
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let reader = self.reader(config);
        tracing::info!(dir = ?reader.dir(), max_rows = reader.max_rows(), "Reading replay logs");

        match &self.log {
            ReplayLog::Fills { coins } => print_json_lines(&reader.fills(coins)?),
            ReplayLog::Orders { coins, meta } => print_json_lines(&reader.orders(coins, *meta)?),
            ReplayLog::StrategyInfo { names } => print_json_lines(&reader.strategy_info(names)?),
            ReplayLog::Theos { coins } => print_json_lines(&reader.theos(coins)?),
            ReplayLog::WsRequests => print_json_lines(&reader.ws_requests()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_overrides() {
        let config = Config::default();
        let args = ReplayArgs {
            dir: Some(PathBuf::from("/tmp/run-1")),
            max_rows: Some(10),
            log: ReplayLog::WsRequests,
        };
        let reader = args.reader(&config);
        assert_eq!(reader.dir(), std::path::Path::new("/tmp/run-1"));
        assert_eq!(reader.max_rows(), 10);

        let args = ReplayArgs {
            dir: None,
            max_rows: None,
            log: ReplayLog::WsRequests,
        };
        let reader = args.reader(&config);
        assert_eq!(reader.dir(), config.replay.directory.as_path());
        assert_eq!(reader.max_rows(), config.replay.max_rows);
    }
}
