//! Analytics database access
//!
//! SQL builders for each view, typed row structs, and a [`RowSource`]
//! abstraction with a ClickHouse HTTP implementation.

pub mod builder;
mod client;
mod types;

pub use builder::{TimeRange, TqTradesFilter, TradesFilter};
pub use client::{parse_json_each_row, Analytics, ClickHouseClient, RowSource};
pub use types::{MinuteTob, OrderMetaRow, TqTrade, Trade};

use crate::lag::InputError;
use thiserror::Error;

/// Errors from fetching or decoding analytics rows
#[derive(Debug, Error)]
pub enum QueryError {
    /// Transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Server rejected the query
    #[error("Query failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// Response row did not match the expected shape
    #[error("Failed to decode row on line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// Rows or lags failed validation
    #[error(transparent)]
    Input(#[from] InputError),
}
