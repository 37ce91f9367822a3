//! Replay directory integration tests

use hl_tape::replay::{
    ReplayError, ReplayReader, FILLS_FILE, ORDERS_FILE, ORDER_META_FILE, STRATEGY_INFO_FILE,
    WS_REQUEST_FILE,
};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, file: &str, lines: &[&str]) {
    let mut f = std::fs::File::create(dir.join(file)).unwrap();
    for line in lines {
        writeln!(f, "{}", line).unwrap();
    }
}

fn replay_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        FILLS_FILE,
        &[
            r#"{"user":"0xaaa","fills":[{"coin":"ETH","px":"3300.5","sz":"1.0","side":"A","time":1735993802000,"startPosition":"2.0","dir":"Close Long","closedPnl":"12.5","hash":"0x2","oid":21,"crossed":false,"fee":"0.3","tid":202,"feeToken":"USDC"}]}"#,
            r#"{"user":"0xbbb","fills":[{"coin":"BTC","px":"95000","sz":"0.01","side":"B","time":1735993801000,"startPosition":"0","dir":"Open Long","closedPnl":"0","hash":"0x1","oid":11,"crossed":true,"fee":"0.2","tid":101,"feeToken":"USDC","cloid":"0xc1"}]}"#,
        ],
    );
    write(
        dir.path(),
        ORDERS_FILE,
        &[
            r#"{"address":"0xbbb","order":{"order":{"cloid":"0xc1","coin":"BTC","limitPx":"95000","oid":11,"origSz":"0.01","side":"B","sz":"0.0","timestamp":1735993800900},"status":"filled","statusTimestamp":1735993801000}}"#,
            r#"{"address":"0xaaa","order":{"order":{"cloid":null,"coin":"ETH","limitPx":"3300.5","oid":21,"origSz":"1.0","side":"A","sz":"0.0","timestamp":1735993801500},"status":"filled","statusTimestamp":1735993802000}}"#,
        ],
    );
    write(
        dir.path(),
        ORDER_META_FILE,
        &[
            r#"{"cloid":"0xc9","time":"2025-01-04T12:29:59Z","float_values":[["edge",9.0]]}"#,
            r#"{"cloid":"0xc1","time":"2025-01-04T12:30:00.800Z","float_values":[["edge",1.25]],"string_values":[["reason","take"]]}"#,
        ],
    );
    write(
        dir.path(),
        STRATEGY_INFO_FILE,
        &[
            r#"[{"MarketMaker":{"time":"2025-01-04T12:30:01Z","position":0.01}},"mm-btc"]"#,
            r#"[{"Taker":{"time":"2025-01-04T12:30:00Z","inventory":-1.0}},"taker-eth"]"#,
        ],
    );
    write(
        dir.path(),
        WS_REQUEST_FILE,
        &[r#"{"submit_time":1735993800100000000,"method":"post","response":"{\"status\":\"ok\"}"}"#],
    );
    dir
}

#[test]
fn test_full_replay_directory() {
    let dir = replay_dir();
    let reader = ReplayReader::new(dir.path());

    let fills = reader.fills::<&str>(&[]).unwrap();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].coin, "BTC");
    assert_eq!(fills[0].user.as_deref(), Some("0xbbb"));
    assert_eq!(fills[1].closed_pnl, 12.5);

    let orders = reader.orders(&["BTC"], true).unwrap();
    assert_eq!(orders.len(), 1);
    let meta = orders[0].meta.as_ref().unwrap();
    assert_eq!(meta.floats["edge"], 1.25);
    assert_eq!(meta.strings["reason"], "take");

    let eth_orders = reader.orders(&["ETH"], true).unwrap();
    assert_eq!(eth_orders.len(), 1);
    assert!(eth_orders[0].meta.is_none());

    let infos = reader.strategy_info::<&str>(&[]).unwrap();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].strategy_name, "taker-eth");
    assert_eq!(infos[0].strategy_type, "Taker");
    assert_eq!(infos[1].fields["position"], 0.01);

    let requests = reader.ws_requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].response.as_ref().unwrap()["status"], "ok");
}

#[test]
fn test_missing_theo_file() {
    let dir = replay_dir();
    let err = ReplayReader::new(dir.path())
        .theos::<&str>(&[])
        .unwrap_err();
    match err {
        ReplayError::Io { path, .. } => assert!(path.ends_with("theo.jsonl")),
        other => panic!("unexpected error {:?}", other),
    }
}
