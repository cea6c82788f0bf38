use futures::stream::Stream;
use futures::{
    StreamExt,
    stream::{self},
};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::pin::Pin;
use std::time::Duration;
use tracing::{Level, event, instrument};

use crate::api::{FlowReply, FlowRequest};
use crate::error::RelayError;

/// Decoded text lines from a streaming exchange. The sequence is finite and
/// not restartable; a mid-stream transport break surfaces as exactly one
/// trailing `Err` element so callers can tell "ended" from "failed".
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Error bodies are truncated to this many characters before being reported.
const MAX_ERROR_BODY: usize = 2048;

/// HTTP client for the flow endpoint. One instance per endpoint; cheap to
/// clone, safe to share across sessions since it holds no session state.
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    /// Build a client with the bearer token baked into the default headers
    /// and a bounded overall timeout for every exchange.
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| RelayError::Config(format!("API key is not a valid header: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(RelayClient {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Single-shot exchange: POST the request, classify failures, and pull the
    /// answer text out of the reply.
    #[instrument(level = "debug", skip(self, request), fields(payload = serde_json::to_string(request).unwrap_or_default()))]
    pub async fn send(&self, request: &FlowRequest) -> Result<String, RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(RelayError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        event!(Level::DEBUG, response = body.as_str());

        Ok(extract_answer(&body))
    }

    /// Streaming exchange: POST once, then surface the response body as a lazy
    /// sequence of text lines. Lines are re-assembled across chunk boundaries;
    /// the unterminated tail, if any, is flushed when the transport closes.
    #[instrument(level = "debug", skip(self, request), fields(payload = serde_json::to_string(request).unwrap_or_default()))]
    pub async fn send_streaming(&self, request: &FlowRequest) -> Result<LineStream, RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        // Chain a terminator marker so the scan state can flush its buffered
        // tail when the transport closes.
        let chunks = response
            .bytes_stream()
            .map(Some)
            .chain(stream::once(async { None }));

        let lines = chunks
            .scan(LineBuffer::default(), |state, item| {
                futures::future::ready(Some(state.accept(item)))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(lines))
    }
}

/// Carries the incomplete trailing line between chunks.
#[derive(Default)]
struct LineBuffer {
    tail: String,
    failed: bool,
}

impl LineBuffer {
    fn accept(
        &mut self,
        item: Option<Result<bytes::Bytes, reqwest::Error>>,
    ) -> Vec<Result<String, RelayError>> {
        if self.failed {
            return vec![];
        }
        match item {
            None => {
                // Transport closed normally; flush the unterminated tail.
                if self.tail.trim().is_empty() {
                    vec![]
                } else {
                    vec![Ok(std::mem::take(&mut self.tail))]
                }
            }
            Some(Err(e)) => {
                self.failed = true;
                vec![Err(RelayError::Stream(e.to_string()))]
            }
            Some(Ok(chunk)) => {
                self.tail.push_str(&String::from_utf8_lossy(&chunk));

                let mut lines = Vec::new();
                let mut last_newline_pos = 0;
                for (idx, _) in self.tail.match_indices('\n') {
                    let line = self.tail[last_newline_pos..idx].trim_end_matches('\r');
                    last_newline_pos = idx + 1;
                    if !line.trim().is_empty() {
                        lines.push(Ok(line.to_string()));
                    }
                }
                self.tail = self.tail[last_newline_pos..].to_string();

                lines
            }
        }
    }
}

fn classify_transport(err: reqwest::Error) -> RelayError {
    if err.is_timeout() {
        RelayError::Timeout
    } else {
        RelayError::Connection(err.to_string())
    }
}

/// Pull the answer out of a reply body, falling back to the raw text when the
/// body is not the expected shape.
fn extract_answer(body: &str) -> String {
    match serde_json::from_str::<FlowReply>(body) {
        Ok(FlowReply {
            chat_output: Some(answer),
            ..
        }) => answer,
        Ok(_) => {
            event!(Level::WARN, "reply has no chat_output, returning raw body");
            body.trim().to_string()
        }
        Err(_) => body.trim().to_string(),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
