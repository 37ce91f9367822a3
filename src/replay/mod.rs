//! Replay log module
//!
//! Reads the JSON-lines files a backtest run writes (fills, orders, order
//! metadata, strategy state, theos, websocket traffic) into typed rows.

mod reader;
mod types;

pub use reader::{
    read_quotes, ReplayReader, DEFAULT_MAX_ROWS, FILLS_FILE, ORDERS_FILE, ORDER_META_FILE,
    STRATEGY_INFO_FILE, THEO_FILE, WS_REQUEST_FILE,
};
pub use types::{Fill, Order, OrderMeta, OrderRecord, StrategyInfo, Theo, WsRequest};

use std::path::PathBuf;
use thiserror::Error;

/// Replay log errors
#[derive(Debug, Error)]
pub enum ReplayError {
    /// File missing or unreadable
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Line is not valid JSON for the expected record
    #[error("{}:{line}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// Line parsed but a required value is missing or malformed
    #[error("{}:{line}: {reason}", .path.display())]
    Invalid {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
