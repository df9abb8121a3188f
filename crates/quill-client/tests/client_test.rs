use mockito::{Matcher, Server};
use quill_client::{AttachMode, ClientError, ClientOptions, StreamClient};
use quill_types::{StreamId, StreamStatus};
use serde_json::json;
use std::time::Duration;

fn sse_body(events: &[&str]) -> String {
    events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect()
}

fn driver_request() -> Matcher {
    Matcher::PartialJson(json!({ "streamId": "s1", "driveIntent": true }))
}

/// Exact body of a reconnect: observer, no `fromGeneration`
fn observer_request() -> Matcher {
    Matcher::Json(json!({ "streamId": "s1", "driveIntent": false, "follow": true }))
}

fn fast_options() -> ClientOptions {
    ClientOptions {
        not_found_retries: 2,
        retry_delay: Duration::from_millis(10),
        max_reconnects: 3,
        connect_timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn test_dropped_connection_resumes_as_observer() {
    let mut server = Server::new_async().await;

    let driver = server
        .mock("POST", "/chat-stream")
        .match_body(driver_request())
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[
            r#"{"type":"snapshot","text":"H","status":"streaming","generation":1}"#,
            r#"{"type":"chunk","text":"i","generation":2,"baseGeneration":1}"#,
        ]))
        .expect(1)
        .create_async()
        .await;

    let observer = server
        .mock("POST", "/chat-stream")
        .match_body(observer_request())
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[
            r#"{"type":"snapshot","text":"Hi","status":"streaming","generation":2}"#,
            r#"{"type":"done","text":"Hi!","generation":2}"#,
        ]))
        .expect(1)
        .create_async()
        .await;

    let client = StreamClient::with_options(server.url(), fast_options()).unwrap();
    let state = client
        .attach(StreamId::from("s1"), AttachMode::Drive)
        .wait_terminal()
        .await
        .unwrap();

    assert_eq!(state.text, "Hi!");
    assert_eq!(state.status, StreamStatus::Done);
    driver.assert_async().await;
    observer.assert_async().await;
}

#[tokio::test]
async fn test_chunk_gap_resyncs_with_full_text() {
    let mut server = Server::new_async().await;

    // Generations 2 and 3 never arrive on the first connection
    let driver = server
        .mock("POST", "/chat-stream")
        .match_body(driver_request())
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[
            r#"{"type":"snapshot","text":"H","status":"streaming","generation":1}"#,
            r#"{"type":"chunk","text":"o","generation":4,"baseGeneration":3}"#,
            r#"{"type":"chunk","text":"!","generation":5,"baseGeneration":4}"#,
        ]))
        .expect(1)
        .create_async()
        .await;

    let observer = server
        .mock("POST", "/chat-stream")
        .match_body(observer_request())
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[
            r#"{"type":"snapshot","text":"Hello","status":"streaming","generation":5}"#,
            r#"{"type":"done","text":"Hello!","generation":6}"#,
        ]))
        .expect(1)
        .create_async()
        .await;

    let client = StreamClient::with_options(server.url(), fast_options()).unwrap();
    let state = client
        .attach(StreamId::from("s1"), AttachMode::Drive)
        .wait_terminal()
        .await
        .unwrap();

    assert_eq!(state.text, "Hello!");
    assert_eq!(state.status, StreamStatus::Done);
    assert!(!state.needs_resync);
    // The connection is dropped at the gap, before the following chunk
    assert_eq!(state.chunk_events, 1);
    driver.assert_async().await;
    observer.assert_async().await;
}

#[tokio::test]
async fn test_not_found_is_retried_then_succeeds() {
    let mut server = Server::new_async().await;

    let not_found = server
        .mock("POST", "/chat-stream")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"Stream not found: s1"}"#)
        .expect(1)
        .create_async()
        .await;

    let found = server
        .mock("POST", "/chat-stream")
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[r#"{"type":"error","text":"Sorry","generation":1}"#]))
        .expect(1)
        .create_async()
        .await;

    let client = StreamClient::with_options(server.url(), fast_options()).unwrap();
    let state = client
        .attach(StreamId::from("s1"), AttachMode::Observe)
        .wait_terminal()
        .await
        .unwrap();

    assert_eq!(state.status, StreamStatus::Error);
    assert_eq!(state.text, "Sorry");
    not_found.assert_async().await;
    found.assert_async().await;
}

#[tokio::test]
async fn test_not_found_gives_up_after_retries() {
    let mut server = Server::new_async().await;

    let not_found = server
        .mock("POST", "/chat-stream")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"Stream not found: s1"}"#)
        .expect(3)
        .create_async()
        .await;

    let client = StreamClient::with_options(server.url(), fast_options()).unwrap();
    let err = client
        .attach(StreamId::from("s1"), AttachMode::Observe)
        .wait_terminal()
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotFound(_)));
    not_found.assert_async().await;
}

#[tokio::test]
async fn test_snapshot_reads_json() {
    let mut server = Server::new_async().await;

    let read = server
        .mock("GET", "/streams/s1")
        .with_header("content-type", "application/json")
        .with_body(r#"{"text":"Hel","status":"streaming","generation":3,"isDelta":false}"#)
        .create_async()
        .await;

    let client = StreamClient::new(server.url()).unwrap();
    let snapshot = client.snapshot(&StreamId::from("s1")).await.unwrap();

    assert_eq!(snapshot.text, "Hel");
    assert_eq!(snapshot.status, StreamStatus::Streaming);
    assert_eq!(snapshot.generation, 3);
    assert!(!snapshot.is_delta);
    read.assert_async().await;
}
