//! JSON-lines readers over a backtest output directory

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use super::types::{
    Fill, FillsLine, Order, OrderMeta, OrderRecord, OrdersLine, StrategyInfo, Theo, WsRequest,
};
use super::ReplayError;
use crate::config::ReplayConfig;
use crate::de;
use crate::lag::RawQuote;

pub const FILLS_FILE: &str = "fills.jsonl";
pub const ORDERS_FILE: &str = "orders.jsonl";
pub const ORDER_META_FILE: &str = "order_meta.jsonl";
pub const STRATEGY_INFO_FILE: &str = "strategy_info.jsonl";
pub const THEO_FILE: &str = "theo.jsonl";
pub const WS_REQUEST_FILE: &str = "ws_request.jsonl";

/// Default cap on rows read per file
pub const DEFAULT_MAX_ROWS: usize = 50_000;

/// Visit each non-blank line with its 1-based line number
fn visit_lines<F>(path: &Path, mut visit: F) -> Result<(), ReplayError>
where
    F: FnMut(usize, &str) -> Result<ControlFlow<()>, ReplayError>,
{
    let io_err = |source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        if visit(idx + 1, &line)?.is_break() {
            break;
        }
    }
    Ok(())
}

fn parse_line<T: DeserializeOwned>(path: &Path, line: usize, text: &str) -> Result<T, ReplayError> {
    serde_json::from_str(text).map_err(|source| ReplayError::Parse {
        path: path.to_path_buf(),
        line,
        source,
    })
}

fn matches_filter<S: AsRef<str>>(filter: &[S], value: &str) -> bool {
    filter.is_empty() || filter.iter().any(|f| f.as_ref() == value)
}

/// Reads the JSON-lines files a backtest run leaves behind
#[derive(Debug, Clone)]
pub struct ReplayReader {
    dir: PathBuf,
    max_rows: usize,
}

impl ReplayReader {
    /// Create a reader for a run directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Create a reader from configuration
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::new(config.directory.clone()).with_max_rows(config.max_rows)
    }

    /// Set the per-file row cap
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Fills from `fills.jsonl`, one line per account batch
    ///
    /// `max_rows` caps the number of lines read. An empty `coins` keeps all.
    pub fn fills<S: AsRef<str>>(&self, coins: &[S]) -> Result<Vec<Fill>, ReplayError> {
        let path = self.path(FILLS_FILE);
        let mut fills = Vec::new();
        let mut rows = 0;

        visit_lines(&path, |line_no, text| {
            if rows >= self.max_rows {
                return Ok(ControlFlow::Break(()));
            }
            rows += 1;

            let line: FillsLine = parse_line(&path, line_no, text)?;
            for mut fill in line.fills {
                fill.user = line.user.clone();
                fills.push(fill);
            }
            Ok(ControlFlow::Continue(()))
        })?;

        fills.retain(|f| matches_filter(coins, &f.coin));
        fills.sort_by_key(|f| f.time);
        tracing::debug!(path = %path.display(), lines = rows, fills = fills.len(), "Read fills");
        Ok(fills)
    }

    /// Orders from `orders.jsonl`, optionally joined with `order_meta.jsonl`
    ///
    /// The join is a left join on `cloid`: an order with several metadata lines
    /// appears once per line, an order with none appears once with `meta: None`.
    /// Only metadata lines for loaded orders count towards `max_rows`.
    pub fn orders<S: AsRef<str>>(
        &self,
        coins: &[S],
        include_meta: bool,
    ) -> Result<Vec<OrderRecord>, ReplayError> {
        let path = self.path(ORDERS_FILE);
        let mut orders: Vec<Order> = Vec::new();
        let mut rows = 0;

        visit_lines(&path, |line_no, text| {
            if rows >= self.max_rows {
                return Ok(ControlFlow::Break(()));
            }
            rows += 1;

            let line: OrdersLine = parse_line(&path, line_no, text)?;
            orders.push(Order::from(line));
            Ok(ControlFlow::Continue(()))
        })?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let metas = if include_meta {
            self.order_metas(&orders)?
        } else {
            HashMap::new()
        };

        let mut records: Vec<OrderRecord> = Vec::with_capacity(orders.len());
        for order in orders {
            let joined = order.cloid.as_ref().and_then(|c| metas.get(c));
            match joined {
                Some(list) if !list.is_empty() => {
                    for meta in list {
                        records.push(OrderRecord {
                            order: order.clone(),
                            meta: Some(meta.clone()),
                        });
                    }
                }
                _ => records.push(OrderRecord { order, meta: None }),
            }
        }

        records.retain(|r| matches_filter(coins, &r.order.coin));
        records.sort_by_key(|r| r.order.time);
        tracing::debug!(path = %path.display(), orders = records.len(), "Read orders");
        Ok(records)
    }

    fn order_metas(
        &self,
        orders: &[Order],
    ) -> Result<HashMap<String, Vec<OrderMeta>>, ReplayError> {
        let path = self.path(ORDER_META_FILE);
        let cloids: HashSet<&str> = orders.iter().filter_map(|o| o.cloid.as_deref()).collect();
        let mut metas: HashMap<String, Vec<OrderMeta>> = HashMap::new();
        let mut rows = 0;

        visit_lines(&path, |line_no, text| {
            let meta: OrderMeta = parse_line(&path, line_no, text)?;
            if !cloids.contains(meta.cloid.as_str()) {
                return Ok(ControlFlow::Continue(()));
            }
            if rows >= self.max_rows {
                return Ok(ControlFlow::Break(()));
            }
            rows += 1;

            metas.entry(meta.cloid.clone()).or_default().push(meta);
            Ok(ControlFlow::Continue(()))
        })?;

        Ok(metas)
    }

    /// Strategy state snapshots from `strategy_info.jsonl`
    ///
    /// Each line is `[{"<Type>": {...}}, "<name>"]`. Lines of any other shape
    /// are skipped. Returns at most `max_rows` snapshots.
    pub fn strategy_info<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<StrategyInfo>, ReplayError> {
        let path = self.path(STRATEGY_INFO_FILE);
        let mut infos = Vec::new();
        let mut skipped = 0usize;

        visit_lines(&path, |line_no, text| {
            let value: Value = parse_line(&path, line_no, text)?;
            let Some((strategy_type, strategy_name, fields)) = split_strategy_line(value) else {
                skipped += 1;
                return Ok(ControlFlow::Continue(()));
            };
            if !matches_filter(names, &strategy_name) {
                return Ok(ControlFlow::Continue(()));
            }
            if infos.len() >= self.max_rows {
                return Ok(ControlFlow::Break(()));
            }

            let time = fields
                .get("time")
                .and_then(Value::as_str)
                .ok_or_else(|| "missing `time`".to_string())
                .and_then(de::parse_timestamp_str)
                .map_err(|reason| ReplayError::Invalid {
                    path: path.clone(),
                    line: line_no,
                    reason,
                })?;

            infos.push(StrategyInfo {
                strategy_type,
                strategy_name,
                time,
                fields,
            });
            Ok(ControlFlow::Continue(()))
        })?;

        if skipped > 0 {
            tracing::debug!(path = %path.display(), skipped, "Skipped malformed strategy info lines");
        }
        infos.sort_by_key(|i| i.time);
        Ok(infos)
    }

    /// Theo snapshots from `theo.jsonl`; at most `max_rows` matching lines
    pub fn theos<S: AsRef<str>>(&self, coins: &[S]) -> Result<Vec<Theo>, ReplayError> {
        let path = self.path(THEO_FILE);
        let mut theos = Vec::new();

        visit_lines(&path, |line_no, text| {
            let theo: Theo = parse_line(&path, line_no, text)?;
            if !matches_filter(coins, &theo.friendly_coin) {
                return Ok(ControlFlow::Continue(()));
            }
            if theos.len() >= self.max_rows {
                return Ok(ControlFlow::Break(()));
            }
            theos.push(theo);
            Ok(ControlFlow::Continue(()))
        })?;

        theos.sort_by_key(|t| t.time);
        Ok(theos)
    }

    /// Websocket requests from `ws_request.jsonl`
    ///
    /// Sorted by `response_capture_time` when any row carries it, otherwise by
    /// `submit_time`. A `response` stored as JSON text is decoded.
    pub fn ws_requests(&self) -> Result<Vec<WsRequest>, ReplayError> {
        let path = self.path(WS_REQUEST_FILE);
        let mut requests = Vec::new();
        let mut rows = 0;

        visit_lines(&path, |line_no, text| {
            if rows >= self.max_rows {
                return Ok(ControlFlow::Break(()));
            }
            rows += 1;

            let mut request: WsRequest = parse_line(&path, line_no, text)?;
            if let Some(Value::String(body)) = &request.response {
                let decoded = parse_line(&path, line_no, body)?;
                request.response = Some(decoded);
            }
            requests.push(request);
            Ok(ControlFlow::Continue(()))
        })?;

        if requests.iter().any(|r| r.response_capture_time.is_some()) {
            requests.sort_by_key(|r| r.response_capture_time);
        } else if requests.iter().any(|r| r.submit_time.is_some()) {
            requests.sort_by_key(|r| r.submit_time);
        }
        Ok(requests)
    }
}

/// `[{"Type": {...}}, "name"]` into its parts
fn split_strategy_line(value: Value) -> Option<(String, String, serde_json::Map<String, Value>)> {
    let Value::Array(mut parts) = value else {
        return None;
    };
    if parts.len() != 2 {
        return None;
    }
    let name = parts.pop()?;
    let info = parts.pop()?;

    let Value::String(name) = name else {
        return None;
    };
    let Value::Object(info) = info else {
        return None;
    };
    let (strategy_type, inner) = info.into_iter().next()?;
    let Value::Object(fields) = inner else {
        return None;
    };
    Some((strategy_type, name, fields))
}

/// Quotes from any JSON-lines file of quote rows, unvalidated
pub fn read_quotes(path: impl AsRef<Path>) -> Result<Vec<RawQuote>, ReplayError> {
    let path = path.as_ref();
    let mut quotes = Vec::new();
    visit_lines(path, |line_no, text| {
        quotes.push(parse_line(path, line_no, text)?);
        Ok(ControlFlow::Continue(()))
    })?;
    tracing::debug!(path = %path.display(), quotes = quotes.len(), "Read quotes");
    Ok(quotes)
}
