//! Replay log record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::de;

/// Fill as reported to the strategy, tagged with the account it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    #[serde(default)]
    pub user: Option<String>,
    pub coin: String,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub px: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub sz: f64,
    pub side: String,
    #[serde(deserialize_with = "de::ms_timestamp")]
    pub time: DateTime<Utc>,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub start_position: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub closed_pnl: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub fee: f64,
    #[serde(deserialize_with = "de::i64_lenient")]
    pub oid: i64,
    #[serde(deserialize_with = "de::i64_lenient")]
    pub tid: i64,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub crossed: Option<bool>,
    #[serde(default)]
    pub fee_token: Option<String>,
    #[serde(default)]
    pub cloid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of `fills.jsonl`
#[derive(Debug, Deserialize)]
pub(crate) struct FillsLine {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub fills: Vec<Fill>,
}

/// Order state snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub address: String,
    pub cloid: Option<String>,
    pub coin: String,
    pub limit_px: f64,
    pub oid: i64,
    pub orig_sz: f64,
    pub side: String,
    pub sz: f64,
    /// Placement time
    pub time: DateTime<Utc>,
    pub status: String,
    pub status_time: DateTime<Utc>,
}

/// One line of `orders.jsonl`
#[derive(Debug, Deserialize)]
pub(crate) struct OrdersLine {
    pub address: String,
    pub order: OrderEnvelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderEnvelope {
    pub order: OrderBody,
    pub status: String,
    #[serde(deserialize_with = "de::ms_timestamp")]
    pub status_timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderBody {
    #[serde(default)]
    pub cloid: Option<String>,
    pub coin: String,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub limit_px: f64,
    #[serde(deserialize_with = "de::i64_lenient")]
    pub oid: i64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub orig_sz: f64,
    pub side: String,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub sz: f64,
    #[serde(deserialize_with = "de::ms_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl From<OrdersLine> for Order {
    fn from(line: OrdersLine) -> Self {
        let body = line.order.order;
        Self {
            address: line.address,
            cloid: body.cloid,
            coin: body.coin,
            limit_px: body.limit_px,
            oid: body.oid,
            orig_sz: body.orig_sz,
            side: body.side,
            sz: body.sz,
            time: body.timestamp,
            status: line.order.status,
            status_time: line.order.status_timestamp,
        }
    }
}

/// Strategy-side annotations for an order, keyed by client order id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawOrderMeta")]
pub struct OrderMeta {
    pub cloid: String,
    pub meta_time: DateTime<Utc>,
    pub floats: BTreeMap<String, f64>,
    pub timestamps: BTreeMap<String, Value>,
    pub strings: BTreeMap<String, String>,
    /// Other top-level fields
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawOrderMeta {
    cloid: String,
    #[serde(deserialize_with = "de::timestamp")]
    time: DateTime<Utc>,
    #[serde(default)]
    float_values: Vec<(String, f64)>,
    #[serde(default)]
    timestamp_values: Vec<(String, Value)>,
    #[serde(default)]
    string_values: Vec<(String, String)>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawOrderMeta> for OrderMeta {
    fn from(raw: RawOrderMeta) -> Self {
        Self {
            cloid: raw.cloid,
            meta_time: raw.time,
            floats: raw.float_values.into_iter().collect(),
            timestamps: raw.timestamp_values.into_iter().collect(),
            strings: raw.string_values.into_iter().collect(),
            extra: raw.extra,
        }
    }
}

/// Order left-joined with its metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub order: Order,
    pub meta: Option<OrderMeta>,
}

/// Strategy state snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    /// Variant tag of the strategy state enum
    pub strategy_type: String,
    pub strategy_name: String,
    pub time: DateTime<Utc>,
    /// Variant payload
    pub fields: Map<String, Value>,
}

/// Theoretical price and its feature decomposition for one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTheo")]
pub struct Theo {
    pub friendly_coin: String,
    pub time: DateTime<Utc>,
    pub floats: BTreeMap<String, f64>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawTheo {
    friendly_coin: String,
    #[serde(deserialize_with = "de::ns_timestamp")]
    time: DateTime<Utc>,
    #[serde(default)]
    float_values: Vec<(String, f64)>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawTheo> for Theo {
    fn from(raw: RawTheo) -> Self {
        Self {
            friendly_coin: raw.friendly_coin,
            time: raw.time,
            floats: raw.float_values.into_iter().collect(),
            extra: raw.extra,
        }
    }
}

impl Theo {
    /// Named value from `float_values`, falling back to a numeric top-level field
    pub fn value(&self, name: &str) -> Option<f64> {
        self.floats
            .get(name)
            .copied()
            .or_else(|| self.extra.get(name).and_then(|v| de::value_to_f64(v).ok()))
    }
}

/// Websocket request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsRequest {
    #[serde(default, deserialize_with = "de::opt_ns_timestamp")]
    pub submit_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_ns_timestamp")]
    pub response_capture_time: Option<DateTime<Utc>>,
    /// Response body; JSON text in the log is decoded by the reader
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
