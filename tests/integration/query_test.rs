//! Query integration tests against a local HTTP endpoint

use chrono::{TimeZone, Utc};
use hl_tape::config::DatabaseConfig;
use hl_tape::query::{Analytics, ClickHouseClient, QueryError, TimeRange, TradesFilter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve a single HTTP response and hand back the raw request text
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).to_string()
    });

    (format!("http://{}/", addr), handle)
}

fn config(url: String) -> DatabaseConfig {
    DatabaseConfig {
        url,
        user: "analyst".to_string(),
        password: Some("secret".to_string()),
        database: Some("hyperliquid".to_string()),
        timeout_secs: 5,
    }
}

fn range() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2025, 1, 4, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 4, 1, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_clickhouse_trades_roundtrip() {
    let body = concat!(
        r#"{"friendly_coin":"BTC","time":"2025-01-04T00:00:02Z","side":"A","px":"95001.0","sz":"0.5","tid":2,"buy_user":"0xb","sell_user":"0xa"}"#,
        "\n",
        r#"{"friendly_coin":"BTC","time":"2025-01-04T00:00:01Z","side":"B","px":95000,"sz":0.1,"tid":"1","buy_user":"0xa","sell_user":"0xb"}"#,
        "\n",
    );
    let (url, server) = serve_once("200 OK", body).await;

    let analytics = Analytics::new(ClickHouseClient::new(&config(url)).unwrap());
    let filter = TradesFilter {
        coins: vec!["BTC".to_string()],
        address: Some("0xa".to_string()),
    };
    let trades = analytics.trades(&range(), &filter).await.unwrap();

    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].tid, 1);
    assert_eq!(trades[0].sign(), 1);
    assert_eq!(trades[1].signed_sz(), -0.5);

    let request = server.await.unwrap();
    let lower = request.to_lowercase();
    assert!(request.starts_with("POST /?"));
    assert!(lower.contains("x-clickhouse-user: analyst"));
    assert!(lower.contains("x-clickhouse-key: secret"));
    assert!(request.contains("date_time_output_format=iso"));
    assert!(request.contains("database=hyperliquid"));
    assert!(request.contains("FROM hyperliquid.trades"));
    assert!(request.trim_end().ends_with("FORMAT JSONEachRow"));
}

#[tokio::test]
async fn test_clickhouse_error_status() {
    let (url, server) = serve_once("500 Internal Server Error", "Code: 60. Unknown table").await;

    let analytics = Analytics::new(ClickHouseClient::new(&config(url)).unwrap());
    let err = analytics.tobs(&range(), &["BTC"]).await.unwrap_err();

    match err {
        QueryError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("Unknown table"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_bbos_with_lags_over_http() {
    let body = concat!(
        r#"{"friendly_coin":"ETH","capture_time":"2025-01-04T00:00:01Z","time":"2025-01-04T00:00:01Z","bid_px":101,"ask_px":101}"#,
        "\n",
        r#"{"friendly_coin":"ETH","capture_time":"2025-01-04T00:00:00Z","time":"2025-01-04T00:00:00Z","bid_px":100,"ask_px":100}"#,
        "\n",
    );
    let (url, server) = serve_once("200 OK", body).await;

    let analytics = Analytics::new(ClickHouseClient::new(&config(url)).unwrap());
    let lags = vec![hl_tape::lag::Lag::parse("1s").unwrap()];
    let table = analytics
        .bbos_with_lags(&range(), &["ETH"], &lags)
        .await
        .unwrap();

    // Sorted ascending by exchange time before the lookup
    assert_eq!(table.rows[0].mid, 100.0);
    let bps = table.column("bps_ret_1s").unwrap();
    assert!((bps[0].unwrap() - 100.0).abs() < 1e-9);
    assert_eq!(bps[1], Some(0.0));
    server.await.unwrap();
}
