//! Query command implementation

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::print_json_lines;
use crate::config::Config;
use crate::data::ParquetWriter;
use crate::de::parse_timestamp_str;
use crate::lag::Lag;
use crate::query::{builder, Analytics, ClickHouseClient, TimeRange, TqTradesFilter, TradesFilter};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Print the SQL instead of running it
    #[arg(long)]
    pub sql_only: bool,

    #[command(subcommand)]
    pub view: QueryView,
}

/// Time window shared by every view
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Window start (exclusive), RFC 3339 or `YYYY-MM-DD HH:MM:SS` UTC
    #[arg(long, value_parser = parse_timestamp_str)]
    pub start: DateTime<Utc>,

    /// Window end (exclusive)
    #[arg(long, value_parser = parse_timestamp_str)]
    pub end: DateTime<Utc>,
}

impl RangeArgs {
    fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

#[derive(Subcommand, Debug)]
pub enum QueryView {
    /// Strategy trades
    TqTrades {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        coin: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Top of book sampled per minute
    MinuteTobs {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long = "coin", required = true)]
        coins: Vec<String>,
    },
    /// Order metadata keys per strategy
    OrderMetas {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long = "strategy", required = true)]
        strategies: Vec<String>,
    },
    /// Top-of-book snapshots
    Tobs {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long = "coin")]
        coins: Vec<String>,
    },
    /// Best bid/offer updates, optionally with lag features
    Bbos {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long = "coin")]
        coins: Vec<String>,
        /// Attach lag features; repeatable
        #[arg(long = "lag")]
        lags: Vec<String>,
        /// Parquet file for the feature table
        #[arg(short, long, requires = "lags")]
        output: Option<PathBuf>,
    },
    /// Public trades
    Trades {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long = "coin")]
        coins: Vec<String>,
        #[arg(long)]
        address: Option<String>,
        /// Only TWAP slice fills
        #[arg(long)]
        twap: bool,
    },
}

impl QueryView {
    /// SQL text this view sends
    pub fn sql(&self) -> String {
        match self {
            QueryView::TqTrades {
                range,
                coin,
                strategy,
                address,
            } => builder::tq_trades(
                &range.range(),
                &TqTradesFilter {
                    coin: coin.clone(),
                    strategy: strategy.clone(),
                    address: address.clone(),
                },
            ),
            QueryView::MinuteTobs { range, coins } => builder::minute_tobs(&range.range(), coins),
            QueryView::OrderMetas { range, strategies } => {
                builder::order_metas(&range.range(), strategies)
            }
            QueryView::Tobs { range, coins } => builder::tobs(&range.range(), coins),
            QueryView::Bbos { range, coins, .. } => builder::bbos(&range.range(), coins),
            QueryView::Trades {
                range,
                coins,
                address,
                twap,
            } => {
                let filter = TradesFilter {
                    coins: coins.clone(),
                    address: address.clone(),
                };
                if *twap {
                    builder::twap_trades(&range.range(), &filter)
                } else {
                    builder::trades(&range.range(), &filter)
                }
            }
        }
    }
}

impl QueryArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if self.sql_only {
            println!("{}", self.view.sql());
            return Ok(());
        }

        let client = ClickHouseClient::new(&config.database)?;
        tracing::info!(url = client.url(), "Querying analytics database");
        let analytics = Analytics::new(client);

        match &self.view {
            QueryView::TqTrades {
                range,
                coin,
                strategy,
                address,
            } => {
                let filter = TqTradesFilter {
                    coin: coin.clone(),
                    strategy: strategy.clone(),
                    address: address.clone(),
                };
                print_json_lines(&analytics.tq_trades(&range.range(), &filter).await?)
            }
            QueryView::MinuteTobs { range, coins } => {
                print_json_lines(&analytics.minute_tobs(&range.range(), coins).await?)
            }
            QueryView::OrderMetas { range, strategies } => {
                print_json_lines(&analytics.order_metas(&range.range(), strategies).await?)
            }
            QueryView::Tobs { range, coins } => {
                print_json_lines(&analytics.tobs(&range.range(), coins).await?)
            }
            QueryView::Bbos {
                range,
                coins,
                lags,
                output,
            } => {
                if lags.is_empty() {
                    return print_json_lines(&analytics.bbos(&range.range(), coins).await?);
                }
                let lags = lags
                    .iter()
                    .map(|s| Lag::parse(s))
                    .collect::<Result<Vec<_>, _>>()?;
                let table = analytics
                    .bbos_with_lags(&range.range(), coins, &lags)
                    .await?;
                match output {
                    Some(path) => ParquetWriter::new().write_lag_table(path, &table),
                    None => print_json_lines(&table.rows),
                }
            }
            QueryView::Trades {
                range,
                coins,
                address,
                twap,
            } => {
                let filter = TradesFilter {
                    coins: coins.clone(),
                    address: address.clone(),
                };
                let rows = if *twap {
                    analytics.twap_trades(&range.range(), &filter).await?
                } else {
                    analytics.trades(&range.range(), &filter).await?
                };
                print_json_lines(&rows)
            }
        }
    }
}
