//! Pipeline Integration Tests
//!
//! Drives the ingestion pipeline end to end through an in-memory
//! transport: filtering, state transitions, malformed input, teardown,
//! connect timeout and reconnection.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{ChannelTransport, close_event, message};
use price_tracker::{
    ConnectionState, IngestionPipeline, PipelineConfig, ReconnectConfig, SessionEnd,
    TickerCodec, TransportError, TransportEvent, WatchList,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

const MIXED_BATCH: &str = r#"[
    {"e":"24hrTicker","E":1700000000000,"s":"BTCUSDT","c":"42123.456789","P":"2.345","v":"100"},
    {"e":"24hrTicker","E":1700000000000,"s":"ETHUSDT","c":"2250.10","P":"-3.1"},
    {"e":"24hrTicker","E":1700000000000,"s":"DOGEUSDT","c":"0.0812345","P":"0.00"},
    {"e":"24hrTicker","E":1700000000000,"s":"SHIBUSDT","c":"0.00000912","P":"5.2"}
]"#;

fn pipeline(config: PipelineConfig) -> Arc<IngestionPipeline> {
    Arc::new(IngestionPipeline::new(
        WatchList::default(),
        TickerCodec::new(),
        config,
    ))
}

async fn wait_for_state(pipeline: &IngestionPipeline, state: ConnectionState) {
    let mut rx = pipeline.connection_states();
    timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .unwrap();
}

async fn wait_for_version(pipeline: &IngestionPipeline, version: u64) {
    let mut rx = pipeline.snapshots();
    timeout(WAIT, rx.wait_for(|s| s.version() >= version))
        .await
        .expect("snapshot version not reached in time")
        .unwrap();
}

#[tokio::test]
async fn watchlist_filters_mixed_batch() {
    let pipeline = pipeline(PipelineConfig::default());
    let (mut transport, tx) = ChannelTransport::new();
    let cancel = CancellationToken::new();

    let task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.run_session(&mut transport, &cancel).await })
    };

    tx.send(TransportEvent::Open).unwrap();
    tx.send(message(MIXED_BATCH)).unwrap();
    wait_for_version(&pipeline, 1).await;

    let snapshot = pipeline.store().snapshot();
    let mut symbols: Vec<&str> = snapshot.records().map(|r| r.symbol()).collect();
    symbols.sort_unstable();
    assert_eq!(symbols, ["BTCUSDT", "DOGEUSDT", "ETHUSDT"]);

    let btc = snapshot.get("BTCUSDT").unwrap();
    assert_eq!(btc.price().to_string(), "42123.4568");
    assert_eq!(btc.change_percent().to_string(), "2.35");
    assert_eq!(btc.previous_price(), btc.price());
    assert_eq!(
        snapshot.get("ETHUSDT").unwrap().change_percent().to_string(),
        "-3.10"
    );
    assert_eq!(
        snapshot.get("DOGEUSDT").unwrap().price().to_string(),
        "0.0812"
    );

    cancel.cancel();
    assert_eq!(timeout(WAIT, task).await.unwrap().unwrap(), SessionEnd::Cancelled);
}

#[tokio::test]
async fn open_batch_close_lifecycle() {
    let pipeline = pipeline(PipelineConfig::default());
    let (mut transport, tx) = ChannelTransport::new();
    let mut states = pipeline.connection_states();
    let mut seen = vec![*states.borrow_and_update()];

    let task = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            pipeline
                .run_session(&mut transport, &CancellationToken::new())
                .await
        })
    };

    tx.send(TransportEvent::Open).unwrap();
    timeout(WAIT, states.changed()).await.unwrap().unwrap();
    seen.push(*states.borrow_and_update());

    tx.send(message(MIXED_BATCH)).unwrap();
    tx.send(close_event()).unwrap();
    timeout(WAIT, states.changed()).await.unwrap().unwrap();
    seen.push(*states.borrow_and_update());

    let end = timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::Closed { went_live: true });
    assert_eq!(
        seen,
        [
            ConnectionState::Connecting,
            ConnectionState::Live,
            ConnectionState::Disconnected
        ]
    );
    assert!(!states.has_changed().unwrap());

    // Contents survive the disconnect.
    assert_eq!(pipeline.store().snapshot().len(), 3);
}

#[tokio::test]
async fn malformed_batch_while_live() {
    let pipeline = pipeline(PipelineConfig::default());
    let (mut transport, tx) = ChannelTransport::new();
    let cancel = CancellationToken::new();

    let task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.run_session(&mut transport, &cancel).await })
    };

    tx.send(TransportEvent::Open).unwrap();
    tx.send(message(MIXED_BATCH)).unwrap();
    wait_for_version(&pipeline, 1).await;
    let before = pipeline.store().snapshot();

    tx.send(message(r#"{"s":"BTCUSDT","c":"1","P":"1"}"#)).unwrap();
    tx.send(message(r#"[{"s":"BTCUSDT","P":"1"}]"#)).unwrap();
    tx.send(TransportEvent::message(
        b"[{\"s\":\"BTCUSDT\",\"c\":\"1\",\"P\":\"1\",\"x\":\"\xff\"}]".to_vec(),
    ))
    .unwrap();
    tx.send(message(r#"[{"s":"ETHUSDT","c":"2300","P":"-1"}]"#)).unwrap();
    wait_for_version(&pipeline, 2).await;

    let after = pipeline.store().snapshot();
    assert_eq!(after.version(), 2);
    assert_eq!(after.get("BTCUSDT"), before.get("BTCUSDT"));

    let eth = after.get("ETHUSDT").unwrap();
    assert_eq!(eth.price().to_string(), "2300.0000");
    assert_eq!(eth.previous_price().to_string(), "2250.1000");

    assert_eq!(pipeline.connection().state(), ConnectionState::Live);
    assert_eq!(pipeline.connection().stats().batches_received, 5);

    cancel.cancel();
    timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn teardown_before_any_event() {
    let pipeline = pipeline(PipelineConfig::default());
    let (mut transport, _tx) = ChannelTransport::new();
    let closes = Arc::clone(&transport.closes);
    let cancel = CancellationToken::new();

    let task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.run_session(&mut transport, &cancel).await })
    };

    cancel.cancel();
    let end = timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(end, SessionEnd::Cancelled);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
    assert!(pipeline.store().snapshot().is_empty());
}

#[tokio::test]
async fn teardown_closes_open_transport() {
    let pipeline = pipeline(PipelineConfig::default());
    let (mut transport, tx) = ChannelTransport::new();
    let closes = Arc::clone(&transport.closes);
    let cancel = CancellationToken::new();

    let task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.run_session(&mut transport, &cancel).await })
    };

    tx.send(TransportEvent::Open).unwrap();
    wait_for_state(&pipeline, ConnectionState::Live).await;

    cancel.cancel();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.connection().state(), ConnectionState::Disconnected);

    // Events after teardown are never processed.
    tx.send(message(MIXED_BATCH)).ok();
    assert!(pipeline.store().snapshot().is_empty());
}

#[tokio::test]
async fn connect_timeout_forces_disconnected() {
    let pipeline = pipeline(PipelineConfig {
        connect_timeout: Duration::from_millis(50),
        reconnect: None,
    });
    let (mut transport, _tx) = ChannelTransport::new();

    let end = timeout(
        WAIT,
        pipeline.run_session(&mut transport, &CancellationToken::new()),
    )
    .await
    .unwrap();

    assert_eq!(end, SessionEnd::TimedOut);
    assert_eq!(pipeline.connection().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn no_reconnect_by_default() {
    let pipeline = pipeline(PipelineConfig::default());
    let (mut transport, tx) = ChannelTransport::new();
    let connects = Arc::clone(&transport.connects);

    tx.send(TransportEvent::Error(TransportError::Open(
        "connection refused".to_string(),
    )))
    .unwrap();

    timeout(WAIT, pipeline.run(&mut transport, CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.connection().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnect_resets_after_live_session() {
    let pipeline = pipeline(PipelineConfig {
        connect_timeout: Duration::from_secs(5),
        reconnect: Some(ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_attempts: 1,
            ..ReconnectConfig::default()
        }),
    });
    let (mut transport, tx) = ChannelTransport::new();
    let connects = Arc::clone(&transport.connects);

    let refused = || TransportEvent::Error(TransportError::Open("refused".to_string()));
    tx.send(refused()).unwrap();
    tx.send(TransportEvent::Open).unwrap();
    tx.send(message(MIXED_BATCH)).unwrap();
    tx.send(close_event()).unwrap();
    tx.send(refused()).unwrap();

    timeout(WAIT, pipeline.run(&mut transport, CancellationToken::new()))
        .await
        .unwrap();

    // refused, live then closed (budget reset), refused, budget spent
    assert_eq!(connects.load(Ordering::SeqCst), 3);
    assert_eq!(pipeline.connection().stats().sessions_started, 3);
    assert_eq!(pipeline.connection().state(), ConnectionState::Disconnected);
    assert_eq!(pipeline.store().snapshot().len(), 3);
}

#[tokio::test]
async fn cancel_during_reconnect_delay() {
    let pipeline = pipeline(PipelineConfig {
        connect_timeout: Duration::from_secs(5),
        reconnect: Some(ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            ..ReconnectConfig::default()
        }),
    });
    let (mut transport, tx) = ChannelTransport::new();
    let connects = Arc::clone(&transport.connects);
    let cancel = CancellationToken::new();

    tx.send(close_event()).unwrap();

    let task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.run(&mut transport, cancel).await })
    };

    wait_for_state(&pipeline, ConnectionState::Disconnected).await;
    cancel.cancel();
    timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(connects.load(Ordering::SeqCst), 1);
}
