//! Lag feature types
//!
//! Quotes in, feature rows out. A [`Lag`] keeps the caller's label so the
//! generated column names match what was asked for (`bps_ret_5s`, ...).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::de;

/// Basis points per unit return
pub const BPS: f64 = 10_000.0;

/// Malformed input to the lag computation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// No lag durations were requested
    #[error("At least one lag is required")]
    EmptyLags,
    /// A row lacks one of friendly_coin, capture_time, bid_px, ask_px
    #[error("Row {row} is missing required field `{field}`")]
    MissingField { row: usize, field: &'static str },
    /// Lag string could not be parsed as a duration
    #[error("Invalid lag {0:?}")]
    InvalidLag(String),
}

/// Top-of-book quote observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Group key (instrument)
    pub friendly_coin: String,
    /// Local capture time, the as-of index
    pub capture_time: DateTime<Utc>,
    /// Exchange time, carried through untouched
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub bid_px: f64,
    pub ask_px: f64,
}

impl Quote {
    /// Create a quote without an exchange timestamp
    pub fn new(
        friendly_coin: impl Into<String>,
        capture_time: DateTime<Utc>,
        bid_px: f64,
        ask_px: f64,
    ) -> Self {
        Self {
            friendly_coin: friendly_coin.into(),
            capture_time,
            time: None,
            bid_px,
            ask_px,
        }
    }

    /// Mid price
    pub fn mid(&self) -> f64 {
        (self.bid_px + self.ask_px) / 2.0
    }
}

/// Quote row as delivered by a row provider, before schema validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    #[serde(default)]
    pub friendly_coin: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub capture_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub bid_px: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub ask_px: Option<f64>,
}

impl RawQuote {
    /// Validate required fields; `row` is reported back in the error
    pub fn into_quote(self, row: usize) -> Result<Quote, InputError> {
        let missing = |field| InputError::MissingField { row, field };
        Ok(Quote {
            friendly_coin: self.friendly_coin.ok_or_else(|| missing("friendly_coin"))?,
            capture_time: self.capture_time.ok_or_else(|| missing("capture_time"))?,
            time: self.time,
            bid_px: self.bid_px.ok_or_else(|| missing("bid_px"))?,
            ask_px: self.ask_px.ok_or_else(|| missing("ask_px"))?,
        })
    }
}

impl From<Quote> for RawQuote {
    fn from(quote: Quote) -> Self {
        Self {
            friendly_coin: Some(quote.friendly_coin),
            capture_time: Some(quote.capture_time),
            time: quote.time,
            bid_px: Some(quote.bid_px),
            ask_px: Some(quote.ask_px),
        }
    }
}

/// Forward offset at which a return is measured
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Lag {
    label: String,
    offset: Duration,
}

impl Lag {
    /// Build a lag from an explicit offset
    pub fn new(label: impl Into<String>, offset: Duration) -> Self {
        Self {
            label: label.into(),
            offset,
        }
    }

    /// Parse a duration string such as `"500ms"`, `"5s"`, `"1m"`, `"1.5h"`
    pub fn parse(s: &str) -> Result<Self, InputError> {
        let label = s.trim();
        let invalid = || InputError::InvalidLag(s.to_string());

        let split = label.find(char::is_alphabetic).ok_or_else(invalid)?;
        let (number, unit) = label.split_at(split);
        let number: f64 = number.trim().parse().map_err(|_| invalid())?;
        let nanos_per_unit = unit_nanos(unit.trim()).ok_or_else(invalid)?;

        let nanos = (number * nanos_per_unit).round();
        if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
            return Err(invalid());
        }

        Ok(Self::new(label, Duration::nanoseconds(nanos as i64)))
    }

    /// Label as given by the caller
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Signed offset added to each observation time
    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// Column name for one feature of this lag
    pub fn column(&self, kind: FeatureKind) -> String {
        format!("{}_{}", kind.prefix(), self.label)
    }
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" | "nanos" | "nanosecond" | "nanoseconds" => 1.0,
        "us" | "µs" | "micros" | "microsecond" | "microseconds" => 1e3,
        "ms" | "millis" | "millisecond" | "milliseconds" => 1e6,
        "s" | "sec" | "secs" | "second" | "seconds" => 1e9,
        "m" | "T" | "min" | "mins" | "minute" | "minutes" => 60e9,
        "h" | "hr" | "hour" | "hours" => 3_600e9,
        "d" | "D" | "day" | "days" => 86_400e9,
        _ => return None,
    };
    Some(nanos)
}

impl FromStr for Lag {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Lag {
    type Error = InputError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Lag> for String {
    fn from(lag: Lag) -> Self {
        lag.label
    }
}

impl fmt::Display for Lag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// The three columns generated per lag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Signed basis-point return
    BpsRet,
    /// Absolute basis-point return
    AbsBpsRet,
    /// Absolute log return in basis points
    AbsLogBpsRet,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 3] = [
        FeatureKind::BpsRet,
        FeatureKind::AbsBpsRet,
        FeatureKind::AbsLogBpsRet,
    ];

    /// Column name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            FeatureKind::BpsRet => "bps_ret",
            FeatureKind::AbsBpsRet => "abs_bps_ret",
            FeatureKind::AbsLogBpsRet => "abs_log_bps_ret",
        }
    }
}

/// Forward-return features for one row and one lag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagFeatures {
    pub bps_ret: f64,
    pub abs_bps_ret: f64,
    pub abs_log_bps_ret: f64,
}

impl LagFeatures {
    /// Features for a move from `mid` to `target_mid`
    ///
    /// Returns `None` when either price is non-finite or not strictly positive:
    /// the ratio and the log are undefined there.
    pub fn between(mid: f64, target_mid: f64) -> Option<Self> {
        if !(mid.is_finite() && target_mid.is_finite() && mid > 0.0 && target_mid > 0.0) {
            return None;
        }

        let ratio = target_mid / mid;
        let bps_ret = (ratio - 1.0) * BPS;
        Some(Self {
            bps_ret,
            abs_bps_ret: bps_ret.abs(),
            abs_log_bps_ret: ratio.ln().abs() * BPS,
        })
    }

    /// Value of one feature column
    pub fn get(&self, kind: FeatureKind) -> f64 {
        match kind {
            FeatureKind::BpsRet => self.bps_ret,
            FeatureKind::AbsBpsRet => self.abs_bps_ret,
            FeatureKind::AbsLogBpsRet => self.abs_log_bps_ret,
        }
    }
}

/// Input quote augmented with one feature slot per lag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub quote: Quote,
    pub mid: f64,
    /// Indexed like [`LagTable::lags`]; `None` where the lookup missed
    pub features: Vec<Option<LagFeatures>>,
}

/// Result of a lag computation, rows in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagTable {
    pub lags: Vec<Lag>,
    pub rows: Vec<FeatureRow>,
}

impl LagTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Generated column names, one triple per lag in lag order
    pub fn column_names(&self) -> Vec<String> {
        self.lags
            .iter()
            .flat_map(|lag| FeatureKind::ALL.iter().map(move |kind| lag.column(*kind)))
            .collect()
    }

    /// Values of a generated column, `None` where missing
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let (lag_idx, kind) = self.lags.iter().enumerate().find_map(|(i, lag)| {
            FeatureKind::ALL
                .iter()
                .find(|kind| lag.column(**kind) == name)
                .map(|kind| (i, *kind))
        })?;

        Some(
            self.rows
                .iter()
                .map(|row| row.features[lag_idx].map(|f| f.get(kind)))
                .collect(),
        )
    }
}
