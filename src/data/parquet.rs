//! Parquet persistence for quote and lag feature tables

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema, TimeUnit, TimestampMicrosecondType};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::lag::{LagTable, Quote, RawQuote};

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Quote columns shared by every table written here
pub fn quote_schema() -> Schema {
    Schema::new(quote_fields())
}

fn quote_fields() -> Vec<Field> {
    vec![
        Field::new("friendly_coin", DataType::Utf8, false),
        Field::new("capture_time", utc_micros(), false),
        Field::new("time", utc_micros(), true),
        Field::new("bid_px", DataType::Float64, false),
        Field::new("ask_px", DataType::Float64, false),
    ]
}

/// Quote columns, `mid`, then one nullable column per generated feature
pub fn lag_table_schema(table: &LagTable) -> Schema {
    let mut fields = quote_fields();
    fields.push(Field::new("mid", DataType::Float64, false));
    for name in table.column_names() {
        fields.push(Field::new(name, DataType::Float64, true));
    }
    Schema::new(fields)
}

fn quote_columns<'a>(quotes: impl Iterator<Item = &'a Quote> + Clone) -> Vec<ArrayRef> {
    let coins: Vec<&str> = quotes.clone().map(|q| q.friendly_coin.as_str()).collect();
    let capture_times: Vec<i64> = quotes
        .clone()
        .map(|q| q.capture_time.timestamp_micros())
        .collect();
    let times: Vec<Option<i64>> = quotes
        .clone()
        .map(|q| q.time.map(|t| t.timestamp_micros()))
        .collect();
    let bids: Vec<f64> = quotes.clone().map(|q| q.bid_px).collect();
    let asks: Vec<f64> = quotes.map(|q| q.ask_px).collect();

    vec![
        Arc::new(StringArray::from(coins)),
        Arc::new(TimestampMicrosecondArray::from(capture_times).with_timezone("UTC")),
        Arc::new(TimestampMicrosecondArray::from(times).with_timezone("UTC")),
        Arc::new(Float64Array::from(bids)),
        Arc::new(Float64Array::from(asks)),
    ]
}

/// Parquet file writer
pub struct ParquetWriter {
    compression: Compression,
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetWriter {
    /// Create a writer using Snappy compression
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    fn write_batch(
        &self,
        path: &Path,
        schema: Arc<Schema>,
        columns: Vec<ArrayRef>,
    ) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        let batch = RecordBatch::try_new(schema, columns)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    /// Write quotes to a Parquet file
    pub fn write_quotes(&self, path: &Path, quotes: &[Quote]) -> anyhow::Result<()> {
        let schema = Arc::new(quote_schema());
        self.write_batch(path, schema, quote_columns(quotes.iter()))?;

        tracing::debug!(path = ?path, count = quotes.len(), "Wrote quotes to Parquet");

        Ok(())
    }

    /// Write a lag feature table to a Parquet file
    pub fn write_lag_table(&self, path: &Path, table: &LagTable) -> anyhow::Result<()> {
        let schema = Arc::new(lag_table_schema(table));

        let mut columns = quote_columns(table.rows.iter().map(|r| &r.quote));
        let mids: Vec<f64> = table.rows.iter().map(|r| r.mid).collect();
        columns.push(Arc::new(Float64Array::from(mids)));

        for name in table.column_names() {
            let values = table
                .column(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown feature column {}", name))?;
            columns.push(Arc::new(Float64Array::from(values)));
        }

        self.write_batch(path, schema, columns)?;

        tracing::debug!(
            path = ?path,
            rows = table.len(),
            lags = table.lags.len(),
            "Wrote lag table to Parquet"
        );

        Ok(())
    }
}

/// Reader for Parquet files
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read quote rows by column name
    ///
    /// Numeric columns may be stored as floats, integers or numeric strings;
    /// time columns as any timestamp unit. Absent columns leave the field
    /// unset so validation can name it.
    pub fn read_quotes(&self) -> anyhow::Result<Vec<RawQuote>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut quotes = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;

            let coins = batch
                .column_by_name("friendly_coin")
                .map(|c| cast(c, &DataType::Utf8))
                .transpose()?;
            let coins = coins.as_ref().map(|c| c.as_string::<i32>());
            let capture_times = time_column(&batch, "capture_time")?;
            let times = time_column(&batch, "time")?;
            let bids = float_column(&batch, "bid_px")?;
            let asks = float_column(&batch, "ask_px")?;

            for i in 0..batch.num_rows() {
                quotes.push(RawQuote {
                    friendly_coin: coins
                        .filter(|c| c.is_valid(i))
                        .map(|c| c.value(i).to_string()),
                    capture_time: timestamp_at(capture_times.as_ref(), i),
                    time: timestamp_at(times.as_ref(), i),
                    bid_px: float_at(bids.as_ref(), i),
                    ask_px: float_at(asks.as_ref(), i),
                });
            }
        }

        tracing::debug!(path = ?self.path, count = quotes.len(), "Read quotes from Parquet");

        Ok(quotes)
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Time column as epoch microseconds
///
/// Naive timestamps are taken as UTC. The target carries no zone so that no
/// zone name has to be resolved.
fn time_column(batch: &RecordBatch, name: &str) -> anyhow::Result<Option<ArrayRef>> {
    Ok(batch
        .column_by_name(name)
        .map(|c| cast(c, &DataType::Timestamp(TimeUnit::Microsecond, None)))
        .transpose()?)
}

fn float_column(batch: &RecordBatch, name: &str) -> anyhow::Result<Option<ArrayRef>> {
    Ok(batch
        .column_by_name(name)
        .map(|c| cast(c, &DataType::Float64))
        .transpose()?)
}

fn timestamp_at(column: Option<&ArrayRef>, i: usize) -> Option<DateTime<Utc>> {
    let column = column?.as_primitive::<TimestampMicrosecondType>();
    if column.is_null(i) {
        return None;
    }
    DateTime::from_timestamp_micros(column.value(i))
}

fn float_at(column: Option<&ArrayRef>, i: usize) -> Option<f64> {
    let column = column?.as_primitive::<Float64Type>();
    (!column.is_null(i)).then(|| column.value(i))
}
