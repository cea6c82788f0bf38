//! One-shot HTTP fixture for exercising the relay client against a real
//! local transport: accepts a single connection, reads the full request,
//! writes a scripted response, and hands the captured request back.

// Each test binary pulls in the helpers it needs.
#![allow(dead_code)]

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub async fn spawn_one_shot(response: Vec<u8>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local test server");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept connection");
        let request = read_request(&mut socket).await;
        socket
            .write_all(&response)
            .await
            .expect("write response");
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{}/score", addr), handle)
}

/// Read one HTTP request: headers up to the blank line, then exactly
/// Content-Length body bytes.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut buf).await.expect("read request");
        assert!(n > 0, "connection closed before headers ended");
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = find_header_end(&raw) {
            break pos;
        }
    };

    let headers = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    let body_start = header_end + 4;
    while raw.len() < body_start + content_length {
        let n = socket.read(&mut buf).await.expect("read body");
        assert!(n > 0, "connection closed before body ended");
        raw.extend_from_slice(&buf[..n]);
    }

    String::from_utf8_lossy(&raw).to_string()
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

pub fn json_response(body: &str) -> Vec<u8> {
    response_with(200, "OK", "application/json", body)
}

pub fn text_response(body: &str) -> Vec<u8> {
    response_with(200, "OK", "text/plain", body)
}

pub fn status_response(code: u16, reason: &str, body: &str) -> Vec<u8> {
    response_with(code, reason, "text/plain", body)
}

fn response_with(code: u16, reason: &str, content_type: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        reason,
        content_type,
        body.len(),
        body
    )
    .into_bytes()
}

/// A response whose advertised length exceeds what is actually written, so
/// the client sees the transport break mid-body.
pub fn broken_stream_response(partial_body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        partial_body.len() + 64,
        partial_body
    )
    .into_bytes()
}
