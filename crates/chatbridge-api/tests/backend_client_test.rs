// Integration tests for `BackendClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatbridge_api::models::{MessageType, PresenceStatus};
use chatbridge_api::{BackendClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn transport(request_ms: u64, observe_ms: u64) -> TransportConfig {
    TransportConfig {
        request_timeout: Duration::from_millis(request_ms),
        observe_timeout: Duration::from_millis(observe_ms),
        ..TransportConfig::default()
    }
}

async fn setup() -> (MockServer, BackendClient) {
    setup_with(transport(2_000, 2_000)).await
}

async fn setup_with(transport: TransportConfig) -> (MockServer, BackendClient) {
    let server = MockServer::start().await;
    let base = format!("{}/api/", server.uri());
    let client =
        BackendClient::from_reqwest(&base, &base, reqwest::Client::new(), &transport).unwrap();
    (server, client)
}

fn ok(body: serde_json::Value) -> ResponseTemplate {
    let mut body = body;
    body["status"] = json!("ok");
    ResponseTemplate::new(200).set_body_json(body)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_create_session_posts_form_credentials() {
    let (server, client) = setup().await;
    let client = client.with_app_key(Some(SecretString::from("key-1".to_string())));

    Mock::given(method("POST"))
        .and(path("/api/session/create"))
        .and(body_string_contains("user=alice"))
        .and(body_string_contains("password=s3cret"))
        .and(body_string_contains("app_key=key-1"))
        .respond_with(ok(json!({
            "session": "tok",
            "nickname": "alice",
            "public_id": "pub-1",
            "presence": "online",
            "user": { "username": "alice", "name": "Alice A." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = client
        .create_session("alice", &SecretString::from("s3cret".to_string()))
        .await
        .unwrap();

    assert_eq!(info.session, "tok");
    assert_eq!(info.public_id, "pub-1");
    assert_eq!(info.user.unwrap().name, "Alice A.");
}

#[tokio::test]
async fn test_show_rooms_joins_ids_and_unwraps_entries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/room/show"))
        .and(query_param("session", "tok"))
        .and(query_param("room", "r1,r2"))
        .respond_with(ok(json!({
            "rooms": [
                { "room": {
                    "id": "r1",
                    "name": "Room One",
                    "messages": [{ "message": {
                        "id": "10", "type": "bot", "nickname": "b", "speaker_id": "b",
                        "text": "hi", "timestamp": "2011-02-15T07:52:17Z"
                    }}],
                    "roster": { "members": [
                        { "username": "alice", "name": "Alice", "owner": true, "presence": true }
                    ]}
                }},
                { "id": "r2", "name": "Room Two" }
            ]
        })))
        .mount(&server)
        .await;

    let rooms = client
        .show_rooms("tok", &["r1".to_string(), "r2".to_string()])
        .await
        .unwrap();

    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].name, "Room One");
    let backlog: Vec<_> = rooms[0].messages.iter().cloned().map(|m| m.into_inner()).collect();
    assert_eq!(backlog[0].message_type, MessageType::Bot);
    let members = &rooms[0].roster.as_ref().unwrap().members;
    assert!(members[0].is_owner);
    assert!(members[0].is_online);
    assert!(rooms[1].roster.is_none());
}

#[tokio::test]
async fn test_subscribe_returns_counter() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/room/subscribe"))
        .and(body_string_contains("room=r1%2Cr2"))
        .and(body_string_contains("reset=true"))
        .respond_with(ok(json!({ "counter": 42 })))
        .mount(&server)
        .await;

    let counter = client
        .subscribe("tok", &["r1".to_string(), "r2".to_string()], true)
        .await
        .unwrap();
    assert_eq!(counter, 42);
}

#[tokio::test]
async fn test_observe_sends_counter_and_parses_events() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/event/observe"))
        .and(query_param("counter", "42"))
        .respond_with(ok(json!({
            "counter": 44,
            "events": [
                { "message": {
                    "id": "11", "room": "r1", "type": "user", "nickname": "bob",
                    "speaker_id": "bob", "public_session_id": "s-bob",
                    "text": "yo", "timestamp": "2011-02-15T07:53:00Z"
                }},
                { "presence": { "room": "r1", "username": "carol", "status": "online" } }
            ]
        })))
        .mount(&server)
        .await;

    let res = client.observe("tok", Some(42)).await.unwrap();

    assert_eq!(res.counter, Some(44));
    assert_eq!(res.events.len(), 2);
    assert_eq!(res.events[0].message.as_ref().unwrap().text, "yo");
    let presence = res.events[1].presence.as_ref().unwrap();
    assert_eq!(presence.status, PresenceStatus::Online);
}

#[tokio::test]
async fn test_observe_goes_to_observe_host() {
    let api = MockServer::start().await;
    let observe = MockServer::start().await;
    let client = BackendClient::from_reqwest(
        &format!("{}/api/", api.uri()),
        &format!("{}/api/", observe.uri()),
        reqwest::Client::new(),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/event/observe"))
        .respond_with(ok(json!({ "counter": 1 })))
        .expect(1)
        .mount(&observe)
        .await;

    client.observe("tok", None).await.unwrap();
    assert!(api.received_requests().await.unwrap().is_empty());
}

// ── Timeout handling ────────────────────────────────────────────────

#[tokio::test]
async fn test_observe_timeout_is_empty_response() {
    let (server, client) = setup_with(transport(2_000, 100)).await;

    Mock::given(method("GET"))
        .and(path("/api/event/observe"))
        .respond_with(ok(json!({ "counter": 9 })).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let res = client.observe("tok", Some(8)).await.unwrap();
    assert_eq!(res.counter, None);
    assert!(res.events.is_empty());
}

#[tokio::test]
async fn test_other_call_timeout_is_error() {
    let (server, client) = setup_with(transport(100, 2_000)).await;

    Mock::given(method("GET"))
        .and(path("/api/user/get_rooms"))
        .respond_with(ok(json!({ "rooms": [] })).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let result = client.get_rooms("tok").await;
    assert!(
        matches!(result, Err(Error::Timeout { ref path, .. }) if path == "user/get_rooms"),
        "expected Timeout, got: {result:?}"
    );
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_credentials_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/session/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "code": "invalid_user_credentials",
            "detail": "The specified user and password don't match."
        })))
        .mount(&server)
        .await;

    let err = client
        .create_session("alice", &SecretString::from("wrong".to_string()))
        .await
        .unwrap_err();
    assert!(err.is_invalid_credentials(), "got: {err:?}");
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/room/say"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let result = client.say("tok", "r1", "alice", "hello").await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body == "Bad Gateway"),
        "expected Deserialization, got: {result:?}"
    );
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let transport = TransportConfig::default();
    let client = BackendClient::from_reqwest(
        "http://127.0.0.1:9/api/",
        "http://127.0.0.1:9/api/",
        reqwest::Client::new(),
        &transport,
    )
    .unwrap();

    let result = client.get_rooms("tok").await;
    assert!(matches!(result, Err(Error::Transport(_))), "got: {result:?}");
}
