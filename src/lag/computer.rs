//! As-of lag feature computation
//!
//! For each quote and each lag, looks up the mid of the latest quote in the
//! same group whose capture time is at or before `capture_time + lag` and
//! measures the return from the quote's own mid to that value.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use super::types::{FeatureRow, InputError, Lag, LagFeatures, LagTable, Quote, RawQuote};

/// Capture-time-sorted mids for one group
#[derive(Debug, Default)]
struct MidSeries {
    times: Vec<DateTime<Utc>>,
    mids: Vec<f64>,
}

impl MidSeries {
    /// Mid of the last observation at or before `target`
    ///
    /// Among equal timestamps the one pushed last wins.
    fn asof(&self, target: DateTime<Utc>) -> Option<f64> {
        let idx = self.times.partition_point(|t| *t <= target);
        idx.checked_sub(1).map(|i| self.mids[i])
    }

    fn last(&self) -> Option<f64> {
        self.mids.last().copied()
    }

    fn lookup(&self, time: DateTime<Utc>, offset: Duration) -> Option<f64> {
        match time.checked_add_signed(offset) {
            Some(target) => self.asof(target),
            // Past the representable range: everything or nothing is in the window
            None if offset > Duration::zero() => self.last(),
            None => None,
        }
    }
}

/// Computes forward-return features at a fixed set of lags
#[derive(Debug, Clone)]
pub struct LagComputer {
    lags: Vec<Lag>,
}

impl LagComputer {
    /// Create a computer; fails if `lags` is empty
    pub fn new(lags: Vec<Lag>) -> Result<Self, InputError> {
        if lags.is_empty() {
            return Err(InputError::EmptyLags);
        }
        Ok(Self { lags })
    }

    /// Create a computer from duration strings like `"1s"`, `"5s"`
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, InputError> {
        let lags = labels
            .iter()
            .map(|s| Lag::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(lags)
    }

    /// Requested lags
    pub fn lags(&self) -> &[Lag] {
        &self.lags
    }

    /// Validate raw rows, then compute
    pub fn compute_raw(&self, rows: Vec<RawQuote>) -> Result<LagTable, InputError> {
        let quotes = rows
            .into_iter()
            .enumerate()
            .map(|(row, raw)| raw.into_quote(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.compute(quotes))
    }

    /// Compute features for every quote; output order matches input order
    pub fn compute(&self, quotes: Vec<Quote>) -> LagTable {
        let series = build_series(&quotes);

        let rows: Vec<FeatureRow> = quotes
            .into_iter()
            .map(|quote| {
                let mid = quote.mid();
                let group = series.get(quote.friendly_coin.as_str());
                let features = self
                    .lags
                    .iter()
                    .map(|lag| {
                        group
                            .and_then(|g| g.lookup(quote.capture_time, lag.offset()))
                            .and_then(|target_mid| LagFeatures::between(mid, target_mid))
                    })
                    .collect();
                FeatureRow {
                    quote,
                    mid,
                    features,
                }
            })
            .collect();

        let missing = rows
            .iter()
            .flat_map(|row| row.features.iter())
            .filter(|f| f.is_none())
            .count();
        tracing::debug!(
            rows = rows.len(),
            groups = series.len(),
            lags = self.lags.len(),
            missing,
            "Computed lag features"
        );

        LagTable {
            lags: self.lags.clone(),
            rows,
        }
    }
}

/// Partition by group and sort by capture time
///
/// The sort is stable, so quotes sharing a capture time keep their input order.
/// Quotes with a non-finite mid are not lookup targets.
fn build_series(quotes: &[Quote]) -> HashMap<String, MidSeries> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, quote) in quotes.iter().enumerate() {
        groups
            .entry(quote.friendly_coin.as_str())
            .or_default()
            .push(idx);
    }

    groups
        .into_iter()
        .map(|(coin, mut indices)| {
            indices.sort_by_key(|&i| quotes[i].capture_time);
            let mut series = MidSeries::default();
            for i in indices {
                let mid = quotes[i].mid();
                if mid.is_finite() {
                    series.times.push(quotes[i].capture_time);
                    series.mids.push(mid);
                }
            }
            (coin.to_string(), series)
        })
        .collect()
}

/// Compute lag features for typed quotes
pub fn compute_lags(quotes: Vec<Quote>, lags: &[Lag]) -> Result<LagTable, InputError> {
    Ok(LagComputer::new(lags.to_vec())?.compute(quotes))
}

/// Compute lag features for unvalidated rows
///
/// Fails with [`InputError::MissingField`] on the first row lacking a
/// required field, or [`InputError::EmptyLags`].
pub fn compute_lags_raw(rows: Vec<RawQuote>, lags: &[Lag]) -> Result<LagTable, InputError> {
    LagComputer::new(lags.to_vec())?.compute_raw(rows)
}
