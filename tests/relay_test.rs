mod common;

use futures::StreamExt;
use std::time::Duration;

use relay::RelayClient;
use relay::RelayError;
use relay::api::{FlowRequest, HistoryEntry};

fn client_for(endpoint: &str) -> RelayClient {
    RelayClient::new(endpoint, "test-key", Duration::from_secs(5)).expect("build client")
}

fn request(input: &str) -> FlowRequest {
    FlowRequest {
        chat_input: input.to_string(),
        chat_history: vec![],
    }
}

#[tokio::test]
async fn single_shot_extracts_chat_output() {
    let (url, server) = common::spawn_one_shot(common::json_response(r#"{"chat_output":"X"}"#)).await;
    let client = client_for(&url);

    let answer = client.send(&request("hi")).await.expect("send succeeds");
    assert_eq!(answer, "X");

    let captured = server.await.unwrap();
    assert!(captured.contains(r#""chat_input":"hi""#));
    assert!(captured.contains("Bearer test-key"));
    assert!(captured.contains("content-type: application/json"));
}

#[tokio::test]
async fn single_shot_sends_history_in_wire_schema() {
    let (url, server) = common::spawn_one_shot(common::json_response(r#"{"chat_output":"ok"}"#)).await;
    let client = client_for(&url);

    let req = FlowRequest {
        chat_input: "next".to_string(),
        chat_history: vec![HistoryEntry::new("q", "a")],
    };
    client.send(&req).await.expect("send succeeds");

    let captured = server.await.unwrap();
    assert!(captured.contains(r#""chat_history":[{"inputs":{"question":"q"},"outputs":{"answer":"a"}}]"#));
}

#[tokio::test]
async fn single_shot_falls_back_to_raw_text() {
    let (url, _server) = common::spawn_one_shot(common::text_response("plain answer")).await;
    let client = client_for(&url);

    let answer = client.send(&request("hi")).await.expect("send succeeds");
    assert_eq!(answer, "plain answer");
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let (url, _server) =
        common::spawn_one_shot(common::status_response(500, "Internal Server Error", "boom")).await;
    let client = client_for(&url);

    let err = client.send(&request("hi")).await.unwrap_err();
    match err {
        RelayError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected HttpStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn connection_refused_is_classified() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}/score", addr));
    let err = client.send(&request("hi")).await.unwrap_err();
    assert!(matches!(err, RelayError::Connection(_)), "got {:?}", err);
}

#[tokio::test]
async fn streaming_yields_lines_then_terminates() {
    let (url, _server) =
        common::spawn_one_shot(common::text_response("alpha\nbeta\ngamma\n")).await;
    let client = client_for(&url);

    let mut lines = client
        .send_streaming(&request("hi"))
        .await
        .expect("stream starts");

    let mut collected = Vec::new();
    while let Some(item) = lines.next().await {
        collected.push(item.expect("line ok"));
    }
    assert_eq!(collected, vec!["alpha", "beta", "gamma"]);

    // Terminated for good: the sequence is finite, not restartable.
    assert!(lines.next().await.is_none());
}

#[tokio::test]
async fn streaming_flushes_unterminated_tail() {
    let (url, _server) = common::spawn_one_shot(common::text_response("alpha\nbeta")).await;
    let client = client_for(&url);

    let lines = client
        .send_streaming(&request("hi"))
        .await
        .expect("stream starts");
    let collected: Vec<_> = lines.map(|item| item.unwrap()).collect().await;
    assert_eq!(collected, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn mid_stream_break_ends_with_error_sentinel() {
    let (url, _server) =
        common::spawn_one_shot(common::broken_stream_response("partial line\nnext")).await;
    let client = client_for(&url);

    let lines = client
        .send_streaming(&request("hi"))
        .await
        .expect("stream starts");
    let collected: Vec<_> = lines.collect().await;

    assert!(collected.len() >= 2, "got {:?}", collected);
    assert_eq!(collected[0].as_ref().unwrap(), "partial line");
    match collected.last().unwrap() {
        Err(RelayError::Stream(_)) => {}
        other => panic!("expected trailing Stream error, got {:?}", other),
    }
    // Exactly one sentinel, nothing after it.
    assert_eq!(
        collected.iter().filter(|item| item.is_err()).count(),
        1
    );
}

#[tokio::test]
async fn streaming_non_success_status_is_http_error() {
    let (url, _server) =
        common::spawn_one_shot(common::status_response(503, "Service Unavailable", "down")).await;
    let client = client_for(&url);

    let err = client.send_streaming(&request("hi")).await.err().unwrap();
    assert!(
        matches!(err, RelayError::HttpStatus { status: 503, .. }),
        "got {:?}",
        err
    );
}
