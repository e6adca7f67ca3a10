//! HTTP registry client tests against a local stub server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use call_relay::auth::Identity;
use call_relay::errors::RegistryError;
use call_relay::registry::{CallRegistry, HttpCallRegistry};
use serde_json::json;

/// Stub registry: one known call, one endpoint that stalls, one that fails.
async fn stub_get_call(Path(call_id): Path<String>) -> axum::response::Response {
    match call_id.as_str() {
        "c1" => Json(json!({"initiatorId": "u1", "participantId": "u2"})).into_response(),
        "c-slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"initiatorId": "u1", "participantId": "u2"})).into_response()
        }
        "c-broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_stub() -> SocketAddr {
    let app = Router::new().route("/internal/calls/:call_id", get(stub_get_call));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn client(addr: SocketAddr) -> HttpCallRegistry {
    HttpCallRegistry::new(format!("http://{addr}"), Duration::from_millis(500))
}

#[tokio::test]
async fn known_call_resolves_with_both_participants() {
    let addr = start_stub().await;

    let record = client(addr).get_call("c1").await.expect("lookup");
    assert_eq!(record.initiator_id, "u1");
    assert_eq!(record.participant_id, "u2");
    assert!(record.authorizes(&Identity::from("u1")));
    assert!(record.authorizes(&Identity::from("u2")));
    assert!(!record.authorizes(&Identity::from("u3")));
}

#[tokio::test]
async fn unknown_call_maps_to_not_found() {
    let addr = start_stub().await;

    let result = client(addr).get_call("c-unknown").await;
    assert!(matches!(result, Err(RegistryError::NotFound)));
}

#[tokio::test]
async fn stalled_registry_maps_to_timeout() {
    let addr = start_stub().await;

    let result = client(addr).get_call("c-slow").await;
    assert!(matches!(result, Err(RegistryError::Timeout)));
}

#[tokio::test]
async fn server_error_maps_to_unavailable() {
    let addr = start_stub().await;

    let result = client(addr).get_call("c-broken").await;
    assert!(matches!(result, Err(RegistryError::Unavailable(_))));
}

#[tokio::test]
async fn unreachable_registry_maps_to_unavailable() {
    // Nothing listens here; connection is refused immediately
    let registry = HttpCallRegistry::new("http://127.0.0.1:9", Duration::from_millis(500));
    let result = registry.get_call("c1").await;
    assert!(matches!(result, Err(RegistryError::Unavailable(_))));
}
