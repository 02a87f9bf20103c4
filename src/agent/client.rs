//! HTTP client for the agent's session API
//!
//! [`AgentApi`] is the seam the rest of the bridge talks to; [`HttpAgentClient`]
//! implements it over `reqwest` against `http://localhost:<port>`:
//!
//! | Method | Path                          | Used for                 |
//! |--------|-------------------------------|--------------------------|
//! | GET    | `/api/session`                | probe, listing           |
//! | POST   | `/api/session`                | create a session         |
//! | POST   | `/api/session/{id}/message`   | submit text, NDJSON body |
//!
//! Non-2xx responses become [`Error::Agent`] carrying the `error` field of a
//! JSON body when there is one, the raw body otherwise.

use super::types::{ByteStream, SessionDescriptor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Timeout for a single health probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Operations the bridge needs from the agent
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Whether the agent answers its listing endpoint. Never fails.
    async fn probe(&self) -> bool;

    /// All sessions known to the agent
    async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>>;

    /// Create a new session
    async fn create_session(&self) -> Result<SessionDescriptor>;

    /// Submit a message; the body streams back as NDJSON chunks
    async fn send_message(&self, session_id: &str, text: &str) -> Result<ByteStream>;
}

/// `reqwest` implementation of [`AgentApi`]
pub struct HttpAgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAgentClient {
    /// Client for an agent listening on localhost
    pub fn new(port: u16) -> Result<Self> {
        Self::with_base_url(format!("http://localhost:{}", port))
    }

    /// Client for an agent at an arbitrary base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        // No overall timeout: message streams run until the agent finishes.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sessions_url(&self) -> String {
        format!("{}/api/session", self.base_url)
    }

    fn message_url(&self, session_id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Agent(format!("Invalid agent URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Agent(format!("Invalid agent URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(&["api", "session", session_id, "message"]);
        Ok(url)
    }

    /// Turn a non-success response into [`Error::Agent`]
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(String::from))
            .unwrap_or(body);
        Err(Error::Agent(format!("HTTP {}: {}", status.as_u16(), message)))
    }
}

#[async_trait]
impl AgentApi for HttpAgentClient {
    async fn probe(&self) -> bool {
        let result = self
            .http
            .get(self.sessions_url())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::debug!(status = resp.status().as_u16(), "Agent probe rejected");
                false
            }
            Err(e) => {
                tracing::debug!("Agent probe failed: {}", e);
                false
            }
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>> {
        let resp = self.http.get(self.sessions_url()).send().await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn create_session(&self) -> Result<SessionDescriptor> {
        let resp = self.http.post(self.sessions_url()).send().await?;
        let resp = Self::check_status(resp).await?;
        let session: SessionDescriptor = resp.json().await?;
        if session.id.is_empty() {
            return Err(Error::Agent("Agent returned a session without an id".to_string()));
        }
        Ok(session)
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<ByteStream> {
        let url = self.message_url(session_id)?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;

        tracing::debug!(session_id, "Agent accepted message, streaming reply");
        Ok(Box::pin(resp.bytes_stream().map(|chunk| chunk.map_err(Error::from))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client = HttpAgentClient::with_base_url("http://localhost:4096/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:4096");
        assert_eq!(client.sessions_url(), "http://localhost:4096/api/session");
    }

    #[test]
    fn test_new_uses_localhost_port() {
        let client = HttpAgentClient::new(5123).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5123");
    }

    #[test]
    fn test_message_url_escapes_session_id() {
        let client = HttpAgentClient::new(4096).unwrap();
        let url = client.message_url("ses/1 x").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4096/api/session/ses%2F1%20x/message"
        );
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_false() {
        // Port 9 (discard) is not expected to serve HTTP
        let client = HttpAgentClient::with_base_url("http://127.0.0.1:9").unwrap();
        assert!(!client.probe().await);
    }

    #[tokio::test]
    async fn test_list_sessions_unreachable_is_error() {
        let client = HttpAgentClient::with_base_url("http://127.0.0.1:9").unwrap();
        let err = client.list_sessions().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
