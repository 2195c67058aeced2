//! HTTP implementation of the backend seams using reqwest

use async_trait::async_trait;
use aura_stream::{
    ConversationSummary, Error, HistoryRecord, Message, QueryRequest, Result, TokenResponse,
};
use futures::StreamExt;
use serde::Deserialize;

use crate::{
    history::History,
    transport::{ByteStream, Transport},
};

/// Default backend address, matching the server's development setup
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Client for the AuraMind REST API
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

/// FastAPI error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl HttpBackend {
    /// Create a backend client for `base_url` (e.g. "http://localhost:8000")
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create with a custom reqwest client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "API URL must start with http:// or https://, got {:?}",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange email and password for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .form(&[("username", email), ("password", password)])
            .send()
            .await?;

        if response.status().as_u16() == 401 {
            // Wrong credentials, not an expired session
            let message = error_detail(response).await;
            return Err(Error::Status {
                status: 401,
                message,
            });
        }
        Ok(check(response).await?.json().await?)
    }

    /// Conversations of the current user, newest first
    pub async fn list_conversations(&self, token: &str) -> Result<Vec<ConversationSummary>> {
        let response = self
            .client
            .get(self.url("/api/history/conversations"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Create an empty conversation
    pub async fn create_conversation(
        &self,
        title: &str,
        token: &str,
    ) -> Result<ConversationSummary> {
        let response = self
            .client
            .post(self.url("/api/history/conversations"))
            .query(&[("title", title)])
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Delete a conversation and its messages
    pub async fn delete_conversation(&self, conversation_id: i64, token: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/api/history/conversations/{}", conversation_id)))
            .bearer_auth(token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpBackend {
    async fn open(&self, request: &QueryRequest, token: &str) -> Result<ByteStream> {
        let response = self
            .client
            .post(self.url("/api/chat/query"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        let response = check(response).await?;

        tracing::debug!(
            "Query accepted for conversation {} ({})",
            request.conversation_id,
            response.status()
        );

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from));
        Ok(Box::pin(body))
    }
}

#[async_trait]
impl History for HttpBackend {
    async fn load_messages(&self, conversation_id: i64, token: &str) -> Result<Vec<Message>> {
        let response = self
            .client
            .get(self.url(&format!(
                "/api/history/conversations/{}/messages",
                conversation_id
            )))
            .bearer_auth(token)
            .send()
            .await?;
        let records: Vec<HistoryRecord> = check(response).await?.json().await?;
        Ok(records.into_iter().map(HistoryRecord::into_message).collect())
    }
}

/// Pass successful responses through, turn the rest into typed errors
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_detail(response).await;
    Err(Error::status(status.as_u16(), message))
}

/// Extract FastAPI's `detail` from an error body, falling back to the raw text
async fn error_detail(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    parse_detail(&text)
}

fn parse_detail(text: &str) -> String {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => text.to_string(),
    }
}
