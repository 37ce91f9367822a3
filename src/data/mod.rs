//! Columnar persistence
//!
//! Stores quote and lag feature tables as Parquet

mod parquet;

pub use parquet::{lag_table_schema, quote_schema, ParquetReader, ParquetWriter};
