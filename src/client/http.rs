use super::sse::decode_fragments;
use super::{ChatBackend, ChatError, ChatResult, ConfigSource, FragmentStream};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// reqwest client for the chat service's `/api` surface.
#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Reads `PARLEY_BASE_URL`, falling back to the local backend.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("PARLEY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_chat(&self, path: &str, message: &str) -> ChatResult<reqwest::Response> {
        let response = self
            .client
            .post(self.url(path))
            .json(&ChatRequest { message })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::http(status));
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[async_trait]
impl ChatBackend for ServiceClient {
    async fn send_message(&self, message: &str) -> ChatResult<String> {
        let response = self.post_chat("/api/chat", message).await?;
        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        Ok(parsed.response)
    }

    async fn stream_message(&self, message: &str) -> ChatResult<FragmentStream> {
        let response = self.post_chat("/api/chat/stream", message).await?;
        let body = Box::pin(response.bytes_stream());
        Ok(decode_fragments(body).boxed())
    }
}

#[async_trait]
impl ConfigSource for ServiceClient {
    async fn fetch_config(&self) -> ChatResult<Value> {
        let response = self.client.get(self.url("/api/config")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::http(status));
        }
        Ok(response.json::<Value>().await?)
    }

    async fn save_config(&self, document: &Value) -> ChatResult<()> {
        let response = self
            .client
            .post(self.url("/api/config"))
            .json(document)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ChatError::http(status))
        }
    }

    async fn fetch_themes(&self) -> ChatResult<Vec<String>> {
        let response = self.client.get(self.url("/api/themes")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::http(status));
        }
        Ok(response.json::<Vec<String>>().await?)
    }
}
