//! End-to-end tests for the viewer `WebSocket`.
//!
//! Each test spawns the relay on `127.0.0.1:0` and connects real
//! `WebSocket` clients. Failure injections go through the router against
//! the same shared state, so they take the same path as an HTTP call.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dfs_relay::config::ServerConfig;
use dfs_relay::origin::OriginPolicy;
use dfs_relay::router::build_router;
use dfs_relay::startup::{RelayHandle, spawn_relay};
use dfs_relay::state::AppState;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn spawn(state: Arc<AppState>) -> RelayHandle {
    let config = ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        ..ServerConfig::default()
    };
    spawn_relay(&config, state).await.unwrap()
}

async fn connect(relay: &RelayHandle) -> Client {
    let url = format!("ws://{}/ws", relay.local_addr());
    let (client, _) = connect_async(url).await.unwrap();
    client
}

/// The upgrade callback registers the viewer asynchronously; wait until
/// the hub has seen it before broadcasting.
async fn wait_for_viewers(state: &AppState, n: usize) {
    tokio::time::timeout(WAIT, async {
        while state.hub.viewer_count().await != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn inject(state: &Arc<AppState>, body: &str) -> StatusCode {
    let request = Request::post("/simulate/failure")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap();
    build_router(Arc::clone(state))
        .oneshot(request)
        .await
        .unwrap()
        .status()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn two_viewers_receive_injected_failure() {
    let state = Arc::new(AppState::default());
    let relay = spawn(Arc::clone(&state)).await;
    let mut a = connect(&relay).await;
    let mut b = connect(&relay).await;
    wait_for_viewers(&state, 2).await;

    let status = inject(&state, r#"{"type":"OVEN_BREAKDOWN","kitchenId":"KITCHEN-A"}"#).await;
    assert_eq!(status, StatusCode::OK);

    for client in [&mut a, &mut b] {
        let frame = next_json(client).await;
        assert_eq!(frame["event"], "FAILURE_INJECTED");
        assert_eq!(frame["data"]["type"], "OVEN_BREAKDOWN");
        assert_eq!(frame["data"]["kitchenId"], "KITCHEN-A");
        assert!(frame["data"]["timestamp"].is_string());
    }

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn order_accepted_is_rebroadcast_as_new_order_to_everyone() {
    let state = Arc::new(AppState::default());
    let relay = spawn(Arc::clone(&state)).await;
    let mut sender = connect(&relay).await;
    let mut other = connect(&relay).await;
    wait_for_viewers(&state, 2).await;

    let payload = json!({
        "orderId": "ORD-42",
        "storeId": "STORE-03",
        "items": [{"sku": "PREM_BURGER", "quantity": 1, "price": 12.5}]
    });
    let frame = json!({"event": "ORDER_ACCEPTED", "data": payload});
    sender.send(Message::Text(frame.to_string().into())).await.unwrap();

    for client in [&mut sender, &mut other] {
        let received = next_json(client).await;
        assert_eq!(received["event"], "NEW_ORDER");
        assert_eq!(received["data"], payload);
    }

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_viewer_frames_keep_connection_open() {
    let state = Arc::new(AppState::default());
    let relay = spawn(Arc::clone(&state)).await;
    let mut client = connect(&relay).await;
    wait_for_viewers(&state, 1).await;

    client
        .send(Message::Text("{not json".to_owned().into()))
        .await
        .unwrap();
    client
        .send(Message::Text(r#"{"event":"PING_TEST","data":1}"#.to_owned().into()))
        .await
        .unwrap();

    let received = next_json(&mut client).await;
    assert_eq!(received, json!({"event": "PING_TEST", "data": 1}));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn ping_gets_one_pong_and_binary_is_ignored() {
    let state = Arc::new(AppState::default());
    let relay = spawn(Arc::clone(&state)).await;
    let mut client = connect(&relay).await;
    wait_for_viewers(&state, 1).await;

    client.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();
    client
        .send(Message::Binary(vec![0xde, 0xad].into()))
        .await
        .unwrap();
    let payload = json!({"orderId": "ORD-5", "storeId": "STORE-01"});
    let frame = json!({"event": "ORDER_ACCEPTED", "data": payload});
    client.send(Message::Text(frame.to_string().into())).await.unwrap();

    let mut pongs: Vec<Vec<u8>> = Vec::new();
    let mut unexpected = Vec::new();
    let relayed = loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match msg {
            Message::Pong(data) => pongs.push(data.to_vec()),
            Message::Text(text) => break serde_json::from_str::<Value>(text.as_str()).unwrap(),
            other => unexpected.push(other),
        }
    };
    assert!(unexpected.is_empty(), "unexpected messages: {unexpected:?}");
    assert_eq!(relayed["event"], "NEW_ORDER");
    assert_eq!(relayed["data"], payload);

    let late = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(late.is_err(), "unexpected extra message: {late:?}");
    assert_eq!(pongs, vec![b"hb".to_vec()]);
    assert_eq!(state.hub.viewer_count().await, 1);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn disconnected_viewer_does_not_block_others() {
    let state = Arc::new(AppState::default());
    let relay = spawn(Arc::clone(&state)).await;
    let mut leaving = connect(&relay).await;
    let mut staying = connect(&relay).await;
    wait_for_viewers(&state, 2).await;

    leaving.close(None).await.unwrap();
    drop(leaving);

    let status = inject(&state, r#"{"type":"FRYER_FIRE","kitchenId":"KITCHEN-C"}"#).await;
    assert_eq!(status, StatusCode::OK);

    let frame = next_json(&mut staying).await;
    assert_eq!(frame["data"]["type"], "FRYER_FIRE");
    wait_for_viewers(&state, 1).await;

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn reconnecting_viewer_gets_no_backlog() {
    let state = Arc::new(AppState::default());
    let relay = spawn(Arc::clone(&state)).await;

    inject(&state, r#"{"type":"MISSED","kitchenId":"KITCHEN-A"}"#).await;

    let mut client = connect(&relay).await;
    wait_for_viewers(&state, 1).await;
    inject(&state, r#"{"type":"SEEN","kitchenId":"KITCHEN-A"}"#).await;

    let frame = next_json(&mut client).await;
    assert_eq!(frame["data"]["type"], "SEEN");

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn disallowed_origin_cannot_connect() {
    let policy = OriginPolicy::from_origins(&["http://ops.local".to_owned()]).unwrap();
    let state = Arc::new(AppState::default().with_origins(policy));
    let relay = spawn(Arc::clone(&state)).await;

    let mut request = format!("ws://{}/ws", relay.local_addr())
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("origin", HeaderValue::from_static("http://elsewhere.test"));
    assert!(connect_async(request).await.is_err());

    let mut request = format!("ws://{}/api/ws", relay.local_addr())
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("origin", HeaderValue::from_static("http://ops.local"));
    let (_client, _) = connect_async(request).await.unwrap();
    wait_for_viewers(&state, 1).await;

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_releases_viewers() {
    let state = Arc::new(AppState::default());
    let relay = spawn(Arc::clone(&state)).await;
    let mut client = connect(&relay).await;
    wait_for_viewers(&state, 1).await;

    relay.shutdown().await.unwrap();
    assert_eq!(state.hub.viewer_count().await, 0);

    let closed = tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
}
