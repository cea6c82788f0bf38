//! Conversation relay for a hosted prompt-flow endpoint: reshapes UI turn
//! history into the endpoint's schema, merges uploaded context into the
//! outgoing message, exchanges it single-shot or line-streamed, and renders
//! embedded diagram blocks from assistant replies via an external tool.

use async_trait::async_trait;

pub mod api;
mod client;
pub mod config;
pub mod context;
pub mod diagram;
pub mod error;
pub mod history;
pub mod session;

pub use client::{LineStream, RelayClient};
pub use error::RelayError;
pub use history::{Role, Turn};

/// The exchange seam the orchestrator talks through. [`RelayClient`] is the
/// production implementation; tests substitute scripted ones.
#[async_trait]
pub trait Relay {
    /// One blocking exchange; resolves to the endpoint's answer text.
    async fn send(&self, request: &api::FlowRequest) -> Result<String, RelayError>;

    /// One streamed exchange; resolves to a finite, non-restartable line
    /// sequence.
    async fn send_streaming(&self, request: &api::FlowRequest) -> Result<LineStream, RelayError>;
}

#[async_trait]
impl Relay for RelayClient {
    async fn send(&self, request: &api::FlowRequest) -> Result<String, RelayError> {
        RelayClient::send(self, request).await
    }

    async fn send_streaming(&self, request: &api::FlowRequest) -> Result<LineStream, RelayError> {
        RelayClient::send_streaming(self, request).await
    }
}
