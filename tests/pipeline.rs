//! End-to-end tests: raw bytes in, dashboard updates out
//!
//! These run the public API only: a byte stream goes through the app's
//! pipeline and the results are observed from hub subscribers, the raw log on
//! disk and the TCP push endpoint.

use futures::StreamExt;
use huskki::codec::format;
use huskki::config::{Config, ReplayConfig};
use huskki::{App, EventHub, Value, server};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

fn wire(timestamp_ms: u32, identifier: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    format::encode_into(timestamp_ms, identifier, payload, &mut out);
    out
}

/// A short ride: noise, rpm, a corrupted frame, tps, an oversized length, coolant.
fn ride() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x13, 0xAA, 0x37];
    bytes.extend(wire(1_000, 0x0100, &[0x4E, 0x20]));

    let mut corrupt = wire(1_010, 0x0100, &[0xFF, 0xFF]);
    *corrupt.last_mut().unwrap() ^= 0x5A;
    bytes.extend(corrupt);

    bytes.extend(wire(1_020, 0x0076, &[0x01, 0xFF]));
    bytes.extend([0xAA, 0x55, 0, 0, 0, 0, 0x01, 0x00, 65]);
    bytes.extend(wire(1_030, 0x0009, &[0x00, 0x5A]));
    bytes
}

#[tokio::test]
async fn live_capture_then_replay_reproduces_updates() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = TempDir::new().unwrap();
    let device = dir.path().join("ttyACM0");
    std::fs::write(&device, ride()).unwrap();

    // Live pass: decode the captured link bytes and record validated frames.
    let mut live = Config::default();
    live.recording.dir = dir.path().join("logs");
    let live_app = App::new(live).unwrap();
    let link = tokio::fs::File::open(&device).await.unwrap();
    let stats = live_app
        .start_live(link, "ttyACM0", CancellationToken::new())
        .await
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(stats.frames, 3);
    assert_eq!(stats.recorded, 3);
    assert_eq!(stats.decoder.crc_mismatch, 1);
    assert_eq!(stats.decoder.bad_length, 1);

    let log = dir.path().join("logs").join("RAWLOG.bin");
    assert!(log.exists());

    // Replay pass: the log alone reproduces the same values, device-stamped.
    let replay = Config {
        replay: Some(ReplayConfig { speed: 0.0, ..ReplayConfig::new(&log) }),
        ..Config::default()
    };
    let replay_app = App::new(replay).unwrap();
    let mut sub = replay_app.hub().subscribe();
    let handle = replay_app.start(CancellationToken::new()).await.unwrap();

    let mut received = Vec::new();
    while let Some(update) = sub.next().await {
        received.push(update);
        if received.len() == 3 {
            break;
        }
    }
    handle.join().await.unwrap();

    assert_eq!(received[0]["rpm"], Value::Int(5000));
    assert_eq!(received[0]["timestamp"], Value::Int(1_000));
    assert_eq!(received[1]["tps"], Value::Int(50));
    assert_eq!(received[2]["coolant"], Value::Int(50));

    // Only the timestamp differs: wall clock live, device clock on replay.
    let mut live_snapshot = live_app.hub().snapshot();
    let mut replay_snapshot = replay_app.hub().snapshot();
    assert_eq!(replay_snapshot.remove("timestamp"), Some(Value::Int(1_030)));
    assert!(live_snapshot.remove("timestamp").is_some());
    assert_eq!(replay_snapshot, live_snapshot);
}

#[tokio::test]
async fn push_server_streams_pipeline_output() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("RAWLOG.bin");
    std::fs::write(&log, ride()).unwrap();

    let config = Config {
        replay: Some(ReplayConfig { speed: 0.0, ..ReplayConfig::new(&log) }),
        ..Config::default()
    };
    let app = App::new(config).unwrap();
    let cancel = CancellationToken::new();

    let listener = server::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_task = tokio::spawn(server::serve(
        listener,
        app.hub().clone(),
        app.history().clone(),
        cancel.clone(),
    ));

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut lines = BufReader::new(stream).lines();
    wait_for_subscribers(app.hub(), 1).await;

    app.start(cancel.clone()).await.unwrap().join().await.unwrap();

    let mut merged = serde_json::Map::new();
    for _ in 0..3 {
        let line = lines.next_line().await.unwrap().unwrap();
        let serde_json::Value::Object(object) = serde_json::from_str(&line).unwrap() else {
            panic!("expected a JSON object, got {line}");
        };
        merged.extend(object);
    }
    assert_eq!(merged["rpm"], 5000);
    assert_eq!(merged["tps"], 50);
    assert_eq!(merged["coolant"], 50);

    cancel.cancel();
    server_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn text_replay_uses_device_clock() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = TempDir::new().unwrap();
    let capture = dir.path().join("capture.csv");
    std::fs::write(&capture, "500,0x0100,0FA0\nnot a frame\n510,0x0070,FF\n").unwrap();

    let config = Config {
        replay: Some(ReplayConfig::new(&capture)),
        text_input: true,
        ..Config::default()
    };
    let app = App::new(config).unwrap();
    app.start(CancellationToken::new()).await.unwrap().join().await.unwrap();

    let snapshot = app.hub().snapshot();
    assert_eq!(snapshot["rpm"], Value::Int(1000));
    assert_eq!(snapshot["grip"], Value::Int(100));
    assert_eq!(snapshot["timestamp"], Value::Int(510));
}

async fn wait_for_subscribers(hub: &EventHub, n: usize) {
    while hub.subscriber_count() < n {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
