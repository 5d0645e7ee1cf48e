//! Live Quote Sync Integration Tests
//!
//! Runs the synchronizer against a real in-process WebSocket server to
//! exercise the production transport adapter end to end: connect,
//! subscription replay, snapshot merge and fan-out, reconnect after a
//! server-side drop, and deliberate shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use stream_core::{
    ConnectionState, QuoteSyncSettings, QuoteSynchronizer, QuoteTransport, SharedState,
    WebSocketQuoteTransport,
};

fn fast_settings(url: String) -> QuoteSyncSettings {
    QuoteSyncSettings {
        url,
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_secs(1),
        jitter_factor: 0.0,
        ..QuoteSyncSettings::default()
    }
}

async fn bind_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

fn synchronizer(url: String, state: SharedState) -> QuoteSynchronizer {
    let transport = Arc::new(WebSocketQuoteTransport::new(url.clone()));
    QuoteSynchronizer::new(
        transport as Arc<dyn QuoteTransport>,
        fast_settings(url),
        state,
    )
}

async fn wait_for_state(sync: &QuoteSynchronizer, expected: ConnectionState) -> bool {
    for _ in 0..200 {
        if sync.connection_state() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn snapshots_merge_into_state_and_fan_out_in_order() {
    let (listener, url) = bind_server().await;

    // Server: accept, expect the subscription replay, push one snapshot,
    // then hold the connection open until the client closes it.
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;

        let replay = ws.next().await.unwrap().unwrap();
        assert!(replay.to_text().unwrap().contains("subscribe"));

        ws.send(Message::text(
            r#"{"MSFT":{"price":375.25,"change":-1.5,"changePercent":-0.4},"AAPL":{"price":185.5,"change":1.25,"changePercent":0.68}}"#,
        ))
        .await
        .unwrap();

        while let Some(message) = ws.next().await {
            if message.is_err() {
                break;
            }
        }
    });

    let state = SharedState::new();
    let sync = synchronizer(url, state.clone());
    sync.subscribe(&["AAPL".to_string(), "MSFT".to_string()]);
    let mut updates = sync.updates();

    sync.enable();
    assert!(wait_for_state(&sync, ConnectionState::Connected).await);

    let first = tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .unwrap()
        .unwrap();

    // Fan-out order follows the document order of the inbound batch.
    assert_eq!(first.symbol, "MSFT");
    assert_eq!(second.symbol, "AAPL");

    let aapl = state.quote("AAPL").unwrap();
    assert_eq!(aapl.price, rust_decimal::Decimal::try_from(185.5).unwrap());
    assert!(state.quote("MSFT").is_some());

    sync.disable();
    assert_eq!(sync.connection_state(), ConnectionState::Disconnected);
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}

#[tokio::test]
async fn reconnects_after_server_drop_and_keeps_merging() {
    let (listener, url) = bind_server().await;

    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<&'static str>();

    let server = tokio::spawn(async move {
        // First connection: one snapshot, then drop.
        let mut ws = accept_ws(&listener).await;
        ws.send(Message::text(
            r#"{"AAPL":{"price":185.5,"change":1.25,"changePercent":0.68}}"#,
        ))
        .await
        .unwrap();
        drop(ws);

        // Second connection proves the client reconnected.
        let mut ws = accept_ws(&listener).await;
        ws.send(Message::text(
            r#"{"AAPL":{"price":186.0,"change":1.75,"changePercent":0.95}}"#,
        ))
        .await
        .unwrap();
        done_tx.send("reconnected").unwrap();

        while let Some(message) = ws.next().await {
            if message.is_err() {
                break;
            }
        }
    });

    let state = SharedState::new();
    let sync = synchronizer(url, state.clone());
    let mut updates = sync.updates();

    sync.enable();

    let first = tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.snapshot.price, rust_decimal::Decimal::try_from(185.5).unwrap());

    let second = tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second.snapshot.price,
        rust_decimal::Decimal::try_from(186.0).unwrap()
    );

    assert_eq!(
        tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
            .await
            .unwrap(),
        Some("reconnected")
    );
    assert!(wait_for_state(&sync, ConnectionState::Connected).await);

    sync.disable();
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}

#[tokio::test]
async fn unreachable_server_cycles_through_reconnecting() {
    // Bind then drop a listener so the port is dead.
    let (listener, url) = bind_server().await;
    drop(listener);

    let sync = synchronizer(url, SharedState::new());
    sync.enable();

    // The link never reaches Connected; it alternates attempts and backoff.
    assert!(wait_for_state(&sync, ConnectionState::Reconnecting).await);

    sync.disable();
    assert_eq!(sync.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disable_closes_the_live_connection() {
    let (listener, url) = bind_server().await;

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<&'static str>();
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        // The stream ends once the client closes on disable.
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        closed_tx.send("closed").unwrap();
    });

    let sync = synchronizer(url, SharedState::new());
    sync.enable();
    assert!(wait_for_state(&sync, ConnectionState::Connected).await);

    sync.disable();

    assert_eq!(
        tokio::time::timeout(Duration::from_secs(5), closed_rx.recv())
            .await
            .unwrap(),
        Some("closed")
    );
    assert_eq!(sync.connection_state(), ConnectionState::Disconnected);
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}
