//! Lag feature module
//!
//! Forward-looking return features for quote data:
//!
//! 1. Mid price per quote
//! 2. Per-group series sorted by capture time
//! 3. As-of lookup of the mid at `capture_time + lag` (self-match allowed)
//! 4. Signed, absolute and absolute-log basis-point returns per lag

mod computer;
mod types;

pub use computer::{compute_lags, compute_lags_raw, LagComputer};
pub use types::{
    FeatureKind, FeatureRow, InputError, Lag, LagFeatures, LagTable, Quote, RawQuote, BPS,
};
