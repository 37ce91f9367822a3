//! Lags command implementation

use clap::Args;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::data::{ParquetReader, ParquetWriter};
use crate::lag::{Lag, LagComputer, LagTable, RawQuote};
use crate::replay;

#[derive(Args, Debug)]
pub struct LagsArgs {
    /// Quote file, JSON lines or Parquet
    pub input: PathBuf,

    /// Lag such as 500ms, 5s, 1min; repeatable. Defaults to [lags] in config
    #[arg(short, long = "lag")]
    pub lags: Vec<String>,

    /// Parquet file for the feature table; a summary is printed otherwise
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl LagsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let lags = if self.lags.is_empty() {
            config.lags.default.clone()
        } else {
            self.lags
                .iter()
                .map(|s| Lag::parse(s))
                .collect::<Result<Vec<_>, _>>()?
        };

        let rows = read_input(&self.input)?;
        tracing::info!(
            input = ?self.input,
            rows = rows.len(),
            lags = lags.len(),
            "Computing lag features"
        );

        let table = LagComputer::new(lags)?.compute_raw(rows)?;

        match &self.output {
            Some(path) => {
                ParquetWriter::new().write_lag_table(path, &table)?;
                tracing::info!(path = ?path, rows = table.len(), "Wrote lag features");
            }
            None => print_summary(&table),
        }
        Ok(())
    }
}

fn read_input(path: &Path) -> anyhow::Result<Vec<RawQuote>> {
    let is_parquet = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        ParquetReader::new(path.to_path_buf()).read_quotes()
    } else {
        Ok(replay::read_quotes(path)?)
    }
}

fn print_summary(table: &LagTable) {
    println!("rows: {}", table.len());
    for name in table.column_names() {
        let values: Vec<f64> = table
            .column(&name)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        let mean = if values.is_empty() {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        println!(
            "  {:<28} present={:<8} mean={:.4}",
            name,
            values.len(),
            mean
        );
    }
}
