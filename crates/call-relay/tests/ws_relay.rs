//! End-to-end signaling tests over real WebSockets.
//!
//! Spins up the relay on an ephemeral port and drives it with
//! tokio-tungstenite clients: the full two-party call flow, the
//! unauthorized third party, authentication close codes, and the
//! protocol-violation surface.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use call_relay::actors::RoomDirectoryHandle;
use call_relay::auth::TokenVerifier;
use call_relay::errors::AUTH_FAILURE_CLOSE_CODE;
use call_relay::registry::CallRegistry;
use call_relay::signaling::{self, SignalingState};
use common::secret::SecretString;
use futures_util::{SinkExt, StreamExt};
use relay_test_utils::{mint_token, PendingCallRegistry, StaticCallRegistry};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

const SECRET: &str = "ws-relay-test-secret";

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a relay with the given registry; returns its address and the
/// shutdown token.
async fn start_relay(registry: Arc<dyn CallRegistry>) -> (SocketAddr, CancellationToken) {
    let shutdown = CancellationToken::new();
    let state = SignalingState {
        verifier: Arc::new(TokenVerifier::new(&SecretString::from(SECRET.to_string()))),
        registry,
        registry_timeout: Duration::from_millis(300),
        directory: RoomDirectoryHandle::new(shutdown.child_token()),
        shutdown: shutdown.clone(),
    };

    let app = signaling::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (addr, shutdown)
}

fn two_party_registry() -> Arc<dyn CallRegistry> {
    Arc::new(StaticCallRegistry::new().with_call("c1", "u1", "u2"))
}

async fn connect_with_token(addr: SocketAddr, token: &str) -> WsClient {
    let url = format!("ws://{addr}/signal?token={token}");
    let (stream, _response) = tokio_tungstenite::connect_async(url).await.expect("connect");
    stream
}

async fn connect_as(addr: SocketAddr, user: &str) -> WsClient {
    connect_with_token(addr, &mint_token(SECRET, user, 60)).await
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string())).await.expect("send");
}

/// Receive the next JSON envelope, skipping transport-level frames.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("socket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).expect("frame is json"),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert that nothing arrives for a moment.
async fn expect_silence(ws: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

async fn join(ws: &mut WsClient, call_id: &str) -> Value {
    send_json(ws, json!({"type": "join", "callId": call_id})).await;
    recv_json(ws).await
}

// ============================================================================
// Two-party call flow
// ============================================================================

#[tokio::test]
async fn two_party_call_flow() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    // u1 joins first and is alone
    let mut ws1 = connect_as(addr, "u1").await;
    let ack = join(&mut ws1, "c1").await;
    assert_eq!(ack, json!({"type": "joined", "callId": "c1", "count": 1}));

    // u2 joins; u1 is notified
    let mut ws2 = connect_as(addr, "u2").await;
    let ack = join(&mut ws2, "c1").await;
    assert_eq!(ack, json!({"type": "joined", "callId": "c1", "count": 2}));

    let notice = recv_json(&mut ws1).await;
    assert_eq!(
        notice,
        json!({"type": "user-joined", "callId": "c1", "userId": "u2"})
    );

    // u1's offer reaches u2 only, stamped with u1's identity even
    // though the client claimed otherwise
    send_json(
        &mut ws1,
        json!({
            "type": "offer",
            "callId": "c1",
            "userId": "someone-else",
            "data": {"sdp": "offer-sdp"}
        }),
    )
    .await;

    let offer = recv_json(&mut ws2).await;
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["userId"], "u1");
    assert_eq!(offer["data"], json!({"sdp": "offer-sdp"}));
    expect_silence(&mut ws1).await;

    // The answer flows back
    send_json(
        &mut ws2,
        json!({"type": "answer", "callId": "c1", "data": {"sdp": "answer-sdp"}}),
    )
    .await;
    let answer = recv_json(&mut ws1).await;
    assert_eq!(answer["type"], "answer");
    assert_eq!(answer["userId"], "u2");
    assert_eq!(answer["data"], json!({"sdp": "answer-sdp"}));

    // Candidates relay the same way
    send_json(
        &mut ws2,
        json!({"type": "ice-candidate", "callId": "c1", "data": {"candidate": "cand-1"}}),
    )
    .await;
    let candidate = recv_json(&mut ws1).await;
    assert_eq!(candidate["type"], "ice-candidate");
    assert_eq!(candidate["data"], json!({"candidate": "cand-1"}));

    // u2 disconnects ungracefully; u1 learns about it
    drop(ws2);
    let notice = recv_json(&mut ws1).await;
    assert_eq!(
        notice,
        json!({"type": "user-left", "callId": "c1", "userId": "u2"})
    );

    // u1 leaves explicitly, then rejoins: a fresh room, not a stale one
    send_json(&mut ws1, json!({"type": "leave", "callId": "c1"})).await;
    let ack = join(&mut ws1, "c1").await;
    assert_eq!(ack, json!({"type": "joined", "callId": "c1", "count": 1}));
}

#[tokio::test]
async fn offer_while_alone_is_dropped_without_error() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    join(&mut ws1, "c1").await;

    send_json(
        &mut ws1,
        json!({"type": "offer", "callId": "c1", "data": {"sdp": "early"}}),
    )
    .await;

    // No delivery, no error, and the connection still works
    expect_silence(&mut ws1).await;
    send_json(&mut ws1, json!({"type": "leave", "callId": "c1"})).await;
    let ack = join(&mut ws1, "c1").await;
    assert_eq!(ack["type"], "joined");
}

// ============================================================================
// Authorization and capacity
// ============================================================================

#[tokio::test]
async fn unauthorized_third_party_is_rejected() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    join(&mut ws1, "c1").await;

    // u3 is authenticated but not a designated participant of c1
    let mut ws3 = connect_as(addr, "u3").await;
    let reply = join(&mut ws3, "c1").await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "not a participant of this call");

    // u1 never hears about the rejected join
    expect_silence(&mut ws1).await;
}

#[tokio::test]
async fn duplicate_identity_cannot_occupy_two_slots() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut first = connect_as(addr, "u1").await;
    join(&mut first, "c1").await;

    let mut second = connect_as(addr, "u1").await;
    let reply = join(&mut second, "c1").await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "already joined this call");

    expect_silence(&mut first).await;
}

#[tokio::test]
async fn unknown_call_is_rejected() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    let reply = join(&mut ws1, "c-missing").await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "call not found");
}

#[tokio::test]
async fn registry_that_never_answers_times_out() {
    let (addr, _shutdown) = start_relay(Arc::new(PendingCallRegistry)).await;

    let mut ws1 = connect_as(addr, "u1").await;
    let reply = join(&mut ws1, "c1").await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "call lookup timed out");
}

// ============================================================================
// Authentication at upgrade
// ============================================================================

async fn expect_auth_close(mut ws: WsClient, expected_reason_fragment: &str) {
    let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for close")
        .expect("stream ended")
        .expect("socket error");

    match frame {
        Message::Close(Some(close)) => {
            assert_eq!(u16::from(close.code), AUTH_FAILURE_CLOSE_CODE);
            assert!(
                close.reason.contains(expected_reason_fragment),
                "close reason {:?} should mention {expected_reason_fragment:?}",
                close.reason
            );
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_token_closes_with_auth_code() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let url = format!("ws://{addr}/signal");
    let (ws, _response) = tokio_tungstenite::connect_async(url).await.expect("connect");
    expect_auth_close(ws, "missing credential").await;
}

#[tokio::test]
async fn invalid_token_closes_with_auth_code() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let ws = connect_with_token(addr, "not-a-real-token").await;
    expect_auth_close(ws, "invalid credential").await;
}

#[tokio::test]
async fn token_signed_with_wrong_secret_closes_with_auth_code() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let forged = mint_token("a-different-secret", "u1", 60);
    let ws = connect_with_token(addr, &forged).await;
    expect_auth_close(ws, "invalid credential").await;
}

// ============================================================================
// Protocol violations and malformed traffic
// ============================================================================

#[tokio::test]
async fn negotiation_before_join_is_a_violation() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    send_json(
        &mut ws1,
        json!({"type": "offer", "callId": "c1", "data": {"sdp": "x"}}),
    )
    .await;

    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "protocol violation: not joined to a call");

    // The connection survived the violation
    let ack = join(&mut ws1, "c1").await;
    assert_eq!(ack["type"], "joined");
}

#[tokio::test]
async fn join_while_joined_is_a_violation() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    join(&mut ws1, "c1").await;

    let reply = join(&mut ws1, "c1").await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "protocol violation: already joined a call");
}

#[tokio::test]
async fn leave_without_join_is_a_violation() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    send_json(&mut ws1, json!({"type": "leave", "callId": "c1"})).await;

    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "protocol violation: not joined to a call");
}

#[tokio::test]
async fn server_only_kinds_are_violations() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    send_json(
        &mut ws1,
        json!({"type": "user-joined", "callId": "c1", "userId": "u2"}),
    )
    .await;

    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "protocol violation: server-only message kind");
}

#[tokio::test]
async fn malformed_frames_keep_the_connection_open() {
    let (addr, _shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;

    // Not JSON at all
    ws1.send(Message::Text("not json".to_string())).await.expect("send");
    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].as_str().unwrap().starts_with("malformed envelope"));

    // Unknown kind
    send_json(&mut ws1, json!({"type": "subscribe", "callId": "c1"})).await;
    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");

    // Negotiation kind without its payload
    send_json(&mut ws1, json!({"type": "offer", "callId": "c1"})).await;
    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");

    // Binary frames are refused but not fatal
    ws1.send(Message::Binary(vec![1, 2, 3])).await.expect("send");
    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");

    // Still usable afterwards
    let ack = join(&mut ws1, "c1").await;
    assert_eq!(ack["type"], "joined");
}

#[tokio::test]
async fn relay_for_a_different_call_is_rejected() {
    let (addr, _shutdown) = start_relay(
        Arc::new(
            StaticCallRegistry::new()
                .with_call("c1", "u1", "u2")
                .with_call("c9", "u1", "u2"),
        ),
    )
    .await;

    let mut ws1 = connect_as(addr, "u1").await;
    join(&mut ws1, "c1").await;

    send_json(
        &mut ws1,
        json!({"type": "offer", "callId": "c9", "data": {"sdp": "x"}}),
    )
    .await;

    let reply = recv_json(&mut ws1).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(
        reply["message"],
        "protocol violation: message addressed to a different call"
    );
}

// ============================================================================
// Concurrency across calls
// ============================================================================

#[tokio::test]
async fn independent_calls_relay_concurrently() {
    let registry = Arc::new(
        StaticCallRegistry::new()
            .with_call("c1", "u1", "u2")
            .with_call("c2", "u3", "u4"),
    );
    let (addr, _shutdown) = start_relay(registry).await;

    let mut ws1 = connect_as(addr, "u1").await;
    let mut ws2 = connect_as(addr, "u2").await;
    let mut ws3 = connect_as(addr, "u3").await;
    let mut ws4 = connect_as(addr, "u4").await;

    join(&mut ws1, "c1").await;
    join(&mut ws2, "c1").await;
    join(&mut ws3, "c2").await;
    join(&mut ws4, "c2").await;
    // Drain user-joined notices
    recv_json(&mut ws1).await;
    recv_json(&mut ws3).await;

    send_json(
        &mut ws1,
        json!({"type": "offer", "callId": "c1", "data": {"sdp": "for-c1"}}),
    )
    .await;
    send_json(
        &mut ws3,
        json!({"type": "offer", "callId": "c2", "data": {"sdp": "for-c2"}}),
    )
    .await;

    let c1_offer = recv_json(&mut ws2).await;
    assert_eq!(c1_offer["data"], json!({"sdp": "for-c1"}));
    assert_eq!(c1_offer["userId"], "u1");

    let c2_offer = recv_json(&mut ws4).await;
    assert_eq!(c2_offer["data"], json!({"sdp": "for-c2"}));
    assert_eq!(c2_offer["userId"], "u3");

    // No cross-call leakage
    expect_silence(&mut ws1).await;
    expect_silence(&mut ws3).await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn shutdown_closes_connections_with_going_away() {
    let (addr, shutdown) = start_relay(two_party_registry()).await;

    let mut ws1 = connect_as(addr, "u1").await;
    join(&mut ws1, "c1").await;

    shutdown.cancel();

    let frame = tokio::time::timeout(Duration::from_secs(2), ws1.next())
        .await
        .expect("timed out waiting for close")
        .expect("stream ended")
        .expect("socket error");

    match frame {
        Message::Close(Some(close)) => {
            assert_eq!(u16::from(close.code), 1001);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}
