//! hl-tape: analytics helpers for Hyperliquid trading activity
//!
//! This library provides:
//! - Time-lagged return features over quote tables (as-of join per coin)
//! - SQL builders and a ClickHouse client for the analytics views
//! - Readers for backtest replay logs
//! - Theo/feature overlays for charting
//! - Parquet persistence of quote and feature tables

pub mod cli;
pub mod config;
pub mod data;
pub mod de;
pub mod lag;
pub mod overlay;
pub mod query;
pub mod replay;
pub mod telemetry;
