//! Typed rows returned by the analytics views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::de;

/// Strategy fill from `tq.tq_view`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TqTrade {
    #[serde(deserialize_with = "de::timestamp")]
    pub time: DateTime<Utc>,
    pub coin: String,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub px: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub sz: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub fee: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub start_position: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub closed_pnl: f64,
    /// Remaining view columns, untyped
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Minute-bucketed top of book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteTob {
    #[serde(deserialize_with = "de::timestamp")]
    pub time: DateTime<Utc>,
    pub friendly_coin: String,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub bid_px: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub ask_px: f64,
}

/// Strategy order metadata key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMetaRow {
    pub strategy_name: String,
    #[serde(deserialize_with = "de::timestamp")]
    pub time: DateTime<Utc>,
    pub cloid: String,
}

/// Public trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub friendly_coin: String,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub capture_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "de::timestamp")]
    pub time: DateTime<Utc>,
    /// `B` for buyer-initiated, `A` for seller-initiated
    pub side: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub px: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub sz: f64,
    #[serde(deserialize_with = "de::i64_lenient")]
    pub tid: i64,
    pub buy_user: String,
    pub sell_user: String,
}

impl Trade {
    /// +1 for buyer-initiated trades, -1 otherwise
    pub fn sign(&self) -> i8 {
        if self.side == "B" {
            1
        } else {
            -1
        }
    }

    /// Signed size from the aggressor's point of view
    pub fn signed_sz(&self) -> f64 {
        self.sz * f64::from(self.sign())
    }
}
