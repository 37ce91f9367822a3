//! End-to-end integration tests

use hl_tape::config::Config;
use hl_tape::data::{ParquetReader, ParquetWriter};
use hl_tape::lag::{compute_lags_raw, Lag};
use hl_tape::overlay::{build_theo_overlay, Palette};
use hl_tape::replay::{read_quotes, ReplayReader, THEO_FILE};
use std::io::Write;
use tempfile::TempDir;

#[test]
fn test_config_example_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
    let config = Config::load(path).unwrap();
    assert_eq!(config.replay.max_rows, 50_000);
    assert_eq!(config.overlay.palette, Palette::category20());
    assert_eq!(config.lags.default[0].label(), "1s");
}

#[test]
fn test_jsonl_to_parquet_features() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("quotes.jsonl");
    let mut f = std::fs::File::create(&input).unwrap();
    for line in [
        r#"{"friendly_coin":"BTC","capture_time":"2025-01-04T12:00:00Z","bid_px":"99","ask_px":"101"}"#,
        r#"{"friendly_coin":"ETH","capture_time":"2025-01-04T12:00:00.5Z","bid_px":9,"ask_px":11}"#,
        r#"{"friendly_coin":"BTC","capture_time":"2025-01-04T12:00:01Z","bid_px":100,"ask_px":102}"#,
    ] {
        writeln!(f, "{}", line).unwrap();
    }
    drop(f);

    let raw = read_quotes(&input).unwrap();
    let table = compute_lags_raw(raw, &[Lag::parse("1s").unwrap()]).unwrap();
    let bps = table.column("bps_ret_1s").unwrap();
    assert!((bps[0].unwrap() - 100.0).abs() < 1e-9);
    assert_eq!(bps[1], Some(0.0));
    assert_eq!(bps[2], Some(0.0));

    let output = dir.path().join("features.parquet");
    ParquetWriter::new().write_lag_table(&output, &table).unwrap();

    // The feature table still carries the quote columns
    let quotes = ParquetReader::new(output).read_quotes().unwrap();
    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[1].friendly_coin.as_deref(), Some("ETH"));
    assert_eq!(quotes[2].bid_px, Some(100.0));
}

#[test]
fn test_replay_theos_to_overlay() {
    let dir = TempDir::new().unwrap();
    let mut f = std::fs::File::create(dir.path().join(THEO_FILE)).unwrap();
    for line in [
        r#"{"friendly_coin":"BTC","time":1735993801000000000,"float_values":[["mid",100.0],["theo",100.3],["flow",0.5],["skew",-0.2]]}"#,
        r#"{"friendly_coin":"ETH","time":1735993800500000000,"float_values":[["mid",10.0],["theo",10.0]]}"#,
        r#"{"friendly_coin":"BTC","time":1735993800000000000,"float_values":[["mid",99.0],["theo",99.1],["flow",0.1],["skew",0.0]]}"#,
    ] {
        writeln!(f, "{}", line).unwrap();
    }
    drop(f);

    let theos = ReplayReader::new(dir.path()).theos(&["BTC"]).unwrap();
    let overlay = build_theo_overlay(&theos, &["flow", "skew"], &Palette::default());

    assert_eq!(overlay.rows.len(), 2);
    assert_eq!(overlay.rows[0].mid, Some(99.0));
    assert_eq!(overlay.rows[0].next_time, Some(overlay.rows[1].time));
    assert_eq!(overlay.rows[1].pos_cum.last().copied().flatten(), Some(100.5));
    assert!((overlay.rows[1].lean - 0.3).abs() < 1e-12);

    let json = overlay.to_json();
    assert_eq!(json["layers"].as_array().unwrap().len(), 6);
}
