//! Row providers: the ClickHouse HTTP client and the typed view accessors

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::builder::{self, TimeRange, TqTradesFilter, TradesFilter};
use super::types::{MinuteTob, OrderMetaRow, TqTrade, Trade};
use super::QueryError;
use crate::config::DatabaseConfig;
use crate::lag::{Lag, LagComputer, LagTable, Quote, RawQuote};

/// Executes SQL and returns the `JSONEachRow` response body
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn query_raw(&self, sql: &str) -> Result<String, QueryError>;
}

/// Parse a `JSONEachRow` body; blank lines are skipped
pub fn parse_json_each_row<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, QueryError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| QueryError::Decode {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// ClickHouse over its HTTP interface
pub struct ClickHouseClient {
    http: reqwest::Client,
    url: String,
    user: String,
    password: Option<String>,
    database: Option<String>,
}

impl ClickHouseClient {
    /// Create a client from configuration
    pub fn new(config: &DatabaseConfig) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RowSource for ClickHouseClient {
    async fn query_raw(&self, sql: &str) -> Result<String, QueryError> {
        let body = format!(
            "{}\nFORMAT JSONEachRow",
            sql.trim_end().trim_end_matches(';')
        );

        let mut request = self
            .http
            .post(&self.url)
            .query(&[
                ("date_time_output_format", "iso"),
                ("output_format_json_quote_64bit_integers", "0"),
            ])
            .header("X-ClickHouse-User", &self.user)
            .body(body);
        if let Some(password) = &self.password {
            request = request.header("X-ClickHouse-Key", password);
        }
        if let Some(database) = &self.database {
            request = request.query(&[("database", database)]);
        }

        let started = std::time::Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "ClickHouse query failed");
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::debug!(
            bytes = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ClickHouse query complete"
        );
        Ok(text)
    }
}

/// Typed accessors for each analytics view
pub struct Analytics<S> {
    source: S,
}

impl<S: RowSource> Analytics<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Underlying row source
    pub fn source(&self) -> &S {
        &self.source
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        view: &str,
        sql: String,
    ) -> Result<Vec<T>, QueryError> {
        let body = self.source.query_raw(&sql).await?;
        let rows: Vec<T> = parse_json_each_row(&body)?;
        tracing::info!(view, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// Strategy fills, sorted by time
    pub async fn tq_trades(
        &self,
        range: &TimeRange,
        filter: &TqTradesFilter,
    ) -> Result<Vec<TqTrade>, QueryError> {
        let mut rows: Vec<TqTrade> = self
            .fetch("tq_trades", builder::tq_trades(range, filter))
            .await?;
        rows.sort_by_key(|r| r.time);
        Ok(rows)
    }

    /// Minute top of book, sorted by time, first row kept per (time, coin)
    pub async fn minute_tobs<C: AsRef<str> + Sync>(
        &self,
        range: &TimeRange,
        coins: &[C],
    ) -> Result<Vec<MinuteTob>, QueryError> {
        let mut rows: Vec<MinuteTob> = self
            .fetch("minute_tobs", builder::minute_tobs(range, coins))
            .await?;
        rows.sort_by_key(|r| r.time);

        let mut seen = std::collections::HashSet::new();
        rows.retain(|r| seen.insert((r.time, r.friendly_coin.clone())));
        Ok(rows)
    }

    /// Order metadata keys, sorted by time
    pub async fn order_metas<C: AsRef<str> + Sync>(
        &self,
        range: &TimeRange,
        strategies: &[C],
    ) -> Result<Vec<OrderMetaRow>, QueryError> {
        let mut rows: Vec<OrderMetaRow> = self
            .fetch("order_metas", builder::order_metas(range, strategies))
            .await?;
        rows.sort_by_key(|r| r.time);
        Ok(rows)
    }

    /// Top-of-book snapshots, sorted by exchange time
    pub async fn tobs<C: AsRef<str> + Sync>(
        &self,
        range: &TimeRange,
        coins: &[C],
    ) -> Result<Vec<Quote>, QueryError> {
        let rows: Vec<RawQuote> = self.fetch("tobs", builder::tobs(range, coins)).await?;
        into_sorted_quotes(rows)
    }

    /// Best bid/offer updates, sorted by exchange time
    pub async fn bbos<C: AsRef<str> + Sync>(
        &self,
        range: &TimeRange,
        coins: &[C],
    ) -> Result<Vec<Quote>, QueryError> {
        let rows: Vec<RawQuote> = self.fetch("bbos", builder::bbos(range, coins)).await?;
        into_sorted_quotes(rows)
    }

    /// Best bid/offer updates with lag features attached
    pub async fn bbos_with_lags<C: AsRef<str> + Sync>(
        &self,
        range: &TimeRange,
        coins: &[C],
        lags: &[Lag],
    ) -> Result<LagTable, QueryError> {
        let computer = LagComputer::new(lags.to_vec())?;
        let quotes = self.bbos(range, coins).await?;
        Ok(computer.compute(quotes))
    }

    /// Public trades, sorted by time
    pub async fn trades(
        &self,
        range: &TimeRange,
        filter: &TradesFilter,
    ) -> Result<Vec<Trade>, QueryError> {
        let mut rows: Vec<Trade> = self.fetch("trades", builder::trades(range, filter)).await?;
        rows.sort_by_key(|r| r.time);
        Ok(rows)
    }

    /// TWAP slice trades, sorted by time
    pub async fn twap_trades(
        &self,
        range: &TimeRange,
        filter: &TradesFilter,
    ) -> Result<Vec<Trade>, QueryError> {
        let mut rows: Vec<Trade> = self
            .fetch("twap_trades", builder::twap_trades(range, filter))
            .await?;
        rows.sort_by_key(|r| r.time);
        Ok(rows)
    }
}

fn into_sorted_quotes(rows: Vec<RawQuote>) -> Result<Vec<Quote>, QueryError> {
    let mut quotes = rows
        .into_iter()
        .enumerate()
        .map(|(row, raw)| raw.into_quote(row))
        .collect::<Result<Vec<_>, _>>()?;
    quotes.sort_by_key(|q| q.time);
    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag::InputError;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Returns a canned body and records the SQL it was asked to run
    struct CannedSource {
        body: String,
        seen: Mutex<Vec<String>>,
    }

    impl CannedSource {
        fn new(body: &str) -> Self {
            Self {
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RowSource for CannedSource {
        async fn query_raw(&self, sql: &str) -> Result<String, QueryError> {
            self.seen.lock().unwrap().push(sql.to_string());
            Ok(self.body.clone())
        }
    }

    fn range() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2025, 1, 4, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 4, 1, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_parse_json_each_row_reports_line() {
        let body = "{\"strategy_name\":\"a\",\"time\":\"2025-01-04T00:00:00Z\",\"cloid\":\"c1\"}\n\nnot json\n";
        let err = parse_json_each_row::<OrderMetaRow>(body).unwrap_err();
        assert!(matches!(err, QueryError::Decode { line: 3, .. }));
    }

    #[tokio::test]
    async fn test_bbos_sorted_by_exchange_time() {
        let body = concat!(
            r#"{"friendly_coin":"BTC","capture_time":"2025-01-04T00:00:02Z","time":"2025-01-04T00:00:02Z","bid_px":101,"ask_px":102}"#,
            "\n",
            r#"{"friendly_coin":"BTC","capture_time":"2025-01-04T00:00:01Z","time":"2025-01-04T00:00:01Z","bid_px":99,"ask_px":100}"#,
            "\n"
        );
        let analytics = Analytics::new(CannedSource::new(body));
        let quotes = analytics.bbos(&range(), &["BTC"]).await.unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].bid_px, 99.0);
        let seen = analytics.source().seen.lock().unwrap();
        assert!(seen[0].contains("FROM hyperliquid.bbo"));
    }

    #[tokio::test]
    async fn test_bbos_with_lags() {
        let body = concat!(
            r#"{"friendly_coin":"BTC","capture_time":"2025-01-04T00:00:00Z","time":"2025-01-04T00:00:00Z","bid_px":99.5,"ask_px":100.5}"#,
            "\n",
            r#"{"friendly_coin":"BTC","capture_time":"2025-01-04T00:00:01Z","time":"2025-01-04T00:00:01Z","bid_px":100.5,"ask_px":101.5}"#,
        );
        let analytics = Analytics::new(CannedSource::new(body));
        let lags = vec![Lag::parse("1s").unwrap()];
        let table = analytics
            .bbos_with_lags(&range(), &["BTC"], &lags)
            .await
            .unwrap();

        let bps = table.column("bps_ret_1s").unwrap();
        assert!((bps[0].unwrap() - 100.0).abs() < 1e-6);
        assert_eq!(bps[1], Some(0.0));
    }

    #[tokio::test]
    async fn test_bbos_with_empty_lags_fails_before_query() {
        let analytics = Analytics::new(CannedSource::new(""));
        let result = analytics.bbos_with_lags(&range(), &["BTC"], &[]).await;
        assert!(matches!(result, Err(QueryError::Input(InputError::EmptyLags))));
        assert!(analytics.source().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tobs_missing_column_is_input_error() {
        let body = r#"{"friendly_coin":"BTC","time":"2025-01-04T00:00:00Z","bid_px":1,"ask_px":2}"#;
        let analytics = Analytics::new(CannedSource::new(body));
        let result = analytics.tobs(&range(), &["BTC"]).await;
        assert!(matches!(
            result,
            Err(QueryError::Input(InputError::MissingField {
                row: 0,
                field: "capture_time"
            }))
        ));
    }

    #[tokio::test]
    async fn test_minute_tobs_dedup() {
        let body = concat!(
            r#"{"time":"2025-01-04T00:01:00Z","friendly_coin":"BTC","bid_px":1,"ask_px":2}"#,
            "\n",
            r#"{"time":"2025-01-04T00:00:00Z","friendly_coin":"BTC","bid_px":3,"ask_px":4}"#,
            "\n",
            r#"{"time":"2025-01-04T00:01:00Z","friendly_coin":"BTC","bid_px":5,"ask_px":6}"#,
            "\n",
            r#"{"time":"2025-01-04T00:01:00Z","friendly_coin":"ETH","bid_px":7,"ask_px":8}"#,
        );
        let analytics = Analytics::new(CannedSource::new(body));
        let rows = analytics.minute_tobs(&range(), &["BTC", "ETH"]).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].bid_px, 3.0);
        assert_eq!(rows[1].bid_px, 1.0);
        assert_eq!(rows[2].friendly_coin, "ETH");
    }

    #[tokio::test]
    async fn test_twap_trades_query_and_sort() {
        let body = concat!(
            r#"{"friendly_coin":"SOL","time":"2025-01-04T00:00:05Z","side":"A","hash":"0x0","px":"150.1","sz":"3","tid":2,"buy_user":"0xa","sell_user":"0xb"}"#,
            "\n",
            r#"{"friendly_coin":"SOL","time":"2025-01-04T00:00:01Z","side":"B","hash":"0x0","px":"150.0","sz":"1","tid":1,"buy_user":"0xa","sell_user":"0xb"}"#,
        );
        let analytics = Analytics::new(CannedSource::new(body));
        let filter = TradesFilter {
            coins: vec!["SOL".into()],
            address: Some("0xa".into()),
        };
        let rows = analytics.twap_trades(&range(), &filter).await.unwrap();

        assert_eq!(rows[0].tid, 1);
        assert_eq!(rows[1].sign(), -1);
        let seen = analytics.source().seen.lock().unwrap();
        assert!(seen[0].contains(builder::ZERO_HASH));
    }
}
