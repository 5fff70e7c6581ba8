//! Client side of the chat service wire contract

mod http;
pub mod pacing;
pub mod sse;

pub use http::{DEFAULT_BASE_URL, ServiceClient};
pub use pacing::Pacer;
pub use sse::{FrameDecoder, decode_fragments};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    /// Non-2xx response from the service.
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("{0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ChatError {
    pub fn transport(message: impl Into<String>) -> Self {
        ChatError::Transport(message.into())
    }

    pub fn http(status: reqwest::StatusCode) -> Self {
        ChatError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ChatError::http(status);
        }
        ChatError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::InvalidResponse(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Ordered content fragments of one streamed reply.
pub type FragmentStream = BoxStream<'static, ChatResult<String>>;

/// The two chat exchanges offered by the service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Single-shot exchange, resolves to the complete reply text.
    async fn send_message(&self, message: &str) -> ChatResult<String>;

    /// Streamed exchange. Fails up front on connection or status errors;
    /// later transport failures arrive as an `Err` item in the stream.
    async fn stream_message(&self, message: &str) -> ChatResult<FragmentStream>;
}

/// Remote configuration document and theme catalogue.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_config(&self) -> ChatResult<Value>;

    async fn save_config(&self, document: &Value) -> ChatResult<()>;

    async fn fetch_themes(&self) -> ChatResult<Vec<String>>;
}
