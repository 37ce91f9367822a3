//! SQL assembly for the analytics views
//!
//! Every caller-supplied value goes through [`quote_literal`].

use chrono::{DateTime, Utc};

/// Timestamp format the views compare against
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Hash carried by TWAP slice fills
pub const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

const TQ_LIMIT: usize = 500_000;
const BOOK_LIMIT: usize = 5_000_000;
const TRADES_LIMIT: usize = 7_000_000;

/// Half-open query window `(start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    fn start_str(&self) -> String {
        self.start.format(TIME_FORMAT).to_string()
    }

    fn end_str(&self) -> String {
        self.end.format(TIME_FORMAT).to_string()
    }

    /// `time > start AND time < end` conditions
    fn bounds(&self, column: &str) -> Vec<String> {
        vec![
            format!("{} > {}", column, quote_literal(&self.start_str())),
            format!("{} < {}", column, quote_literal(&self.end_str())),
        ]
    }
}

/// Filters for the strategy trade view
#[derive(Debug, Clone, Default)]
pub struct TqTradesFilter {
    pub coin: Option<String>,
    pub strategy: Option<String>,
    pub address: Option<String>,
}

/// Filters for the public trade tape
#[derive(Debug, Clone, Default)]
pub struct TradesFilter {
    /// Empty means all coins
    pub coins: Vec<String>,
    /// Matches either side of the trade
    pub address: Option<String>,
}

/// Single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "''");
    format!("'{}'", escaped)
}

/// `column IN ('a', 'b')`; an empty list matches nothing
pub fn in_list<S: AsRef<str>>(column: &str, values: &[S]) -> String {
    if values.is_empty() {
        return "1 = 0".to_string();
    }
    let items: Vec<String> = values.iter().map(|v| quote_literal(v.as_ref())).collect();
    format!("{} IN ({})", column, items.join(", "))
}

fn where_clause(conditions: &[String]) -> String {
    conditions.join("\n  AND ")
}

/// Fills attributed to strategies
pub fn tq_trades(range: &TimeRange, filter: &TqTradesFilter) -> String {
    let start = quote_literal(&range.start_str());
    let end = quote_literal(&range.end_str());

    let mut conditions = vec![format!("time > {}", start)];
    if let Some(coin) = &filter.coin {
        conditions.push(format!("coin = {}", quote_literal(coin)));
    }
    if let Some(strategy) = &filter.strategy {
        conditions.push(format!("strategy = {}", quote_literal(strategy)));
    }
    if let Some(address) = &filter.address {
        conditions.push(format!("address = {}", quote_literal(address)));
    }

    format!(
        "SELECT *\nFROM tq.tq_view(start_time={}, end_time={})\nWHERE {}\nORDER BY time\nLIMIT {}",
        start,
        end,
        where_clause(&conditions),
        TQ_LIMIT
    )
}

/// Last top-of-book per coin and minute
pub fn minute_tobs<S: AsRef<str>>(range: &TimeRange, coins: &[S]) -> String {
    let mut conditions = range.bounds("time");
    conditions.push(in_list("friendly_coin", coins));

    format!(
        "SELECT\n  toStartOfMinute(time) AS time,\n  last_value(bid_px) AS bid_px,\n  last_value(ask_px) AS ask_px,\n  friendly_coin\nFROM hyperliquid.tobs\nWHERE {}\nGROUP BY time, friendly_coin\nORDER BY time\nLIMIT {}",
        where_clause(&conditions),
        BOOK_LIMIT
    )
}

/// Order metadata rows written by strategies
pub fn order_metas<S: AsRef<str>>(range: &TimeRange, strategies: &[S]) -> String {
    let mut conditions = range.bounds("time");
    conditions.push(in_list("strategy_name", strategies));

    format!(
        "SELECT\n  strategy_name,\n  time,\n  cloid\nFROM strategy.order_meta\nWHERE {}\nORDER BY time\nLIMIT {}",
        where_clause(&conditions),
        BOOK_LIMIT
    )
}

/// Top-of-book snapshots, one per coin and exchange time
pub fn tobs<S: AsRef<str>>(range: &TimeRange, coins: &[S]) -> String {
    book_top("hyperliquid.tobs", "tobs", "ORDER BY time", range, coins)
}

/// Best bid/offer updates, latest capture per coin and exchange time
pub fn bbos<S: AsRef<str>>(range: &TimeRange, coins: &[S]) -> String {
    book_top("hyperliquid.bbo", "bbo", "ORDER BY time DESC", range, coins)
}

fn book_top<S: AsRef<str>>(
    table: &str,
    alias: &str,
    order: &str,
    range: &TimeRange,
    coins: &[S],
) -> String {
    let mut conditions = range.bounds("time");
    conditions.push(in_list(&format!("{}.friendly_coin", alias), coins));

    format!(
        "SELECT\n  friendly_coin,\n  capture_time,\n  time,\n  bid_px,\n  ask_px\nFROM {}\nWHERE {}\n{}\nLIMIT 1 BY (friendly_coin, time)\nLIMIT {}",
        table,
        where_clause(&conditions),
        order,
        BOOK_LIMIT
    )
}

/// Public trade tape
pub fn trades(range: &TimeRange, filter: &TradesFilter) -> String {
    trade_tape(range, filter, false)
}

/// TWAP slices: trades carrying the zero hash
pub fn twap_trades(range: &TimeRange, filter: &TradesFilter) -> String {
    trade_tape(range, filter, true)
}

fn trade_tape(range: &TimeRange, filter: &TradesFilter, twap_only: bool) -> String {
    let mut conditions = range.bounds("time");
    if twap_only {
        conditions.push(format!("hash = {}", quote_literal(ZERO_HASH)));
    }
    if !filter.coins.is_empty() {
        conditions.push(in_list("trades.friendly_coin", &filter.coins));
    }
    if let Some(address) = &filter.address {
        let address = quote_literal(address);
        conditions.push(format!(
            "(trades.buy_user = {} OR trades.sell_user = {})",
            address, address
        ));
    }

    let hash_column = if twap_only { "  hash,\n" } else { "" };
    format!(
        "SELECT\n  friendly_coin,\n  capture_time,\n  time,\n  side,\n{}  toFloat64(px) AS px,\n  toFloat64(sz) AS sz,\n  tid,\n  buy_user,\n  sell_user\nFROM hyperliquid.trades\nWHERE {}\nORDER BY time\nLIMIT 1 BY (friendly_coin, time, tid)\nLIMIT {}",
        hash_column,
        where_clause(&conditions),
        TRADES_LIMIT
    )
}
