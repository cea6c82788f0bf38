use futures::stream;
use tracing::{debug, warn};

use crate::api::FlowRequest;
use crate::client::LineStream;
use crate::context::{self, UploadedContext};
use crate::diagram::{self, DiagramRenderer};
use crate::history::{self, Turn};
use crate::Relay;

/// When uploaded context is folded into outgoing messages. The corpus of UI
/// variants diverges here, so the choice is an explicit session parameter
/// rather than implicit timing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ContextPolicy {
    /// Re-send the context with every message while it stays uploaded.
    #[default]
    EveryMessage,
    /// Send the context once, then suppress it until the next upload.
    Once,
}

/// Per-session conversation state. Owned by the caller and threaded through
/// every call; nothing lives in process-wide storage, so independent sessions
/// cannot leak context into each other.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub turns: Vec<Turn>,
    uploaded: Option<UploadedContext>,
    policy: ContextPolicy,
    context_sent: bool,
}

impl SessionState {
    pub fn new(policy: ContextPolicy) -> Self {
        SessionState {
            policy,
            ..Default::default()
        }
    }

    /// Attach an uploaded artifact, replacing any previous one and re-arming
    /// the once-only policy.
    pub fn upload(&mut self, context: UploadedContext) {
        self.uploaded = Some(context);
        self.context_sent = false;
    }

    pub fn clear_upload(&mut self) {
        self.uploaded = None;
        self.context_sent = false;
    }

    /// Drop all conversation state: turns, uploaded context, sent flag.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.clear_upload();
    }

    pub fn has_upload(&self) -> bool {
        self.uploaded.is_some()
    }

    /// Most recent assistant turn, if any. The diagram pipeline runs over this.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == history::Role::Assistant)
            .map(|turn| turn.content.as_str())
    }

    fn context_for_send(&self) -> Option<&UploadedContext> {
        match self.policy {
            ContextPolicy::EveryMessage => self.uploaded.as_ref(),
            ContextPolicy::Once if !self.context_sent => self.uploaded.as_ref(),
            ContextPolicy::Once => None,
        }
    }

    fn mark_context_sent(&mut self) {
        if self.uploaded.is_some() {
            self.context_sent = true;
        }
    }
}

/// Composes history translation, context merging, the relay exchange, and the
/// diagram pipeline. This is the single seam the UI layer calls; it holds the
/// relay handle and renderer but no conversation state.
pub struct Orchestrator<R> {
    relay: R,
    renderer: DiagramRenderer,
}

impl<R: Relay> Orchestrator<R> {
    pub fn new(relay: R) -> Self {
        Orchestrator {
            relay,
            renderer: DiagramRenderer::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: DiagramRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    fn build_request(&self, message: &str, session: &SessionState) -> FlowRequest {
        FlowRequest {
            chat_input: context::merge(message, session.context_for_send()),
            chat_history: history::translate(&session.turns),
        }
    }

    /// Handle one user message: translate history, merge context, send, and
    /// append both turns on success. Every failure comes back as reply text;
    /// nothing escapes as a crash, and a failed exchange leaves the session
    /// unchanged so the user can simply resend.
    pub async fn handle(&self, message: &str, session: &mut SessionState) -> String {
        let request = self.build_request(message, session);
        match self.relay.send(&request).await {
            Ok(answer) => {
                session.mark_context_sent();
                session.turns.push(Turn::user(message));
                session.turns.push(Turn::assistant(answer.clone()));
                answer
            }
            Err(err) => {
                warn!(error = %err, "relay exchange failed");
                format!("Relay request failed: {}", err)
            }
        }
    }

    /// Streaming variant. The caller drives the line sequence and appends the
    /// user turn plus the accumulated assistant turn itself once drained;
    /// dropping the stream mid-way abandons the exchange and closes the
    /// transport. A failure to even start the exchange is delivered as a
    /// one-line stream carrying the failure text.
    pub async fn handle_streaming(&self, message: &str, session: &mut SessionState) -> LineStream {
        let request = self.build_request(message, session);
        match self.relay.send_streaming(&request).await {
            Ok(lines) => {
                session.mark_context_sent();
                lines
            }
            Err(err) => {
                warn!(error = %err, "relay exchange failed before streaming");
                let text = format!("Relay request failed: {}", err);
                Box::pin(stream::once(async move { Ok(text) }))
            }
        }
    }

    /// Dry-run: the JSON payload `handle` would send, without any network
    /// I/O. Does not consume the once-only context.
    pub fn preview(&self, message: &str, session: &SessionState) -> String {
        let request = self.build_request(message, session);
        serde_json::to_string_pretty(&request).unwrap_or_else(|_| "{}".to_string())
    }

    /// Run the diagram pipeline over an assistant message: extract the first
    /// delimited block, render it out-of-process, decode the raster. Any
    /// failure along the way is "no diagram available", logged but never
    /// propagated.
    pub async fn render_diagram(&self, assistant_text: &str) -> Option<image::DynamicImage> {
        let block = diagram::extract(assistant_text)?;
        debug!(len = block.len(), "found diagram block");

        let bytes = match self.renderer.render(block).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "diagram render failed");
                return None;
            }
        };

        match diagram::decode(&bytes) {
            Ok(image) => image,
            Err(err) => {
                warn!(error = %err, "diagram decode failed");
                None
            }
        }
    }
}
