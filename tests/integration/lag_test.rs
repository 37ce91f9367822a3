//! Lag feature integration tests

use chrono::{DateTime, Duration, Utc};
use hl_tape::lag::{compute_lags, FeatureKind, InputError, Lag, LagComputer, Quote, RawQuote};

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_993_800, 0).unwrap() + Duration::milliseconds(ms)
}

fn quote(coin: &str, ms: i64, mid: f64) -> Quote {
    Quote::new(coin, at(ms), mid - 0.5, mid + 0.5)
}

#[test]
fn test_forward_fill_between_observations() {
    let quotes = vec![
        quote("BTC", 0, 100.0),
        quote("BTC", 400, 101.0),
        quote("BTC", 1_700, 102.0),
    ];
    let table = compute_lags(quotes, &[Lag::parse("1s").unwrap()]).unwrap();

    // t=0 looks up t<=1000 -> 101; t=400 looks up t<=1400 -> 101 (forward filled)
    let bps = table.column("bps_ret_1s").unwrap();
    assert!((bps[0].unwrap() - 100.0).abs() < 1e-9);
    assert_eq!(bps[1], Some(0.0));
    assert_eq!(bps[2], Some(0.0));
}

#[test]
fn test_multiple_lags_and_groups() {
    let quotes = vec![
        quote("ETH", 0, 10.0),
        quote("BTC", 0, 100.0),
        quote("ETH", 5_000, 11.0),
        quote("BTC", 60_000, 90.0),
    ];
    let lags = vec![Lag::parse("5s").unwrap(), Lag::parse("1min").unwrap()];
    let table = compute_lags(quotes, &lags).unwrap();

    assert_eq!(table.len(), 4);
    assert_eq!(table.column_names().len(), 6);

    let eth_5s = table.rows[0].features[0].unwrap();
    assert!((eth_5s.bps_ret - 1000.0).abs() < 1e-9);
    assert!((eth_5s.abs_log_bps_ret - (1.1f64).ln() * 1e4).abs() < 1e-6);

    let btc_1m = table.rows[1].features[1].unwrap();
    assert!((btc_1m.get(FeatureKind::AbsBpsRet) - 1000.0).abs() < 1e-9);
    assert!((btc_1m.bps_ret + 1000.0).abs() < 1e-9);

    // BTC's 5s lookup never reaches ETH's t=5s row
    let btc_5s = table.rows[1].features[0].unwrap();
    assert_eq!(btc_5s.bps_ret, 0.0);
}

#[test]
fn test_computer_reports_missing_field() {
    let computer = LagComputer::from_labels(&["1s"]).unwrap();
    let rows = vec![
        RawQuote::from(quote("BTC", 0, 100.0)),
        RawQuote {
            friendly_coin: Some("BTC".into()),
            capture_time: Some(at(10)),
            bid_px: Some(99.0),
            ..Default::default()
        },
    ];
    assert_eq!(
        computer.compute_raw(rows),
        Err(InputError::MissingField {
            row: 1,
            field: "ask_px"
        })
    );
}

#[test]
fn test_empty_lags_rejected() {
    assert_eq!(
        compute_lags(vec![quote("BTC", 0, 1.0)], &[]),
        Err(InputError::EmptyLags)
    );
}
