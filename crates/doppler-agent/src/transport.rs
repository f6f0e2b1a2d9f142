use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// Longest response body kept for logging.
const MAX_BODY_LOG_CHARS: usize = 200;

/// Status and (truncated) body of the endpoint's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Delivers a serialized envelope to the collection endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post `body` (JSON) and return the endpoint's answer. Any status is
    /// `Ok`; only failures to get an answer at all are errors.
    async fn send(&self, body: Vec<u8>) -> Result<TransportResponse>;

    /// Where payloads go, for logging.
    fn endpoint(&self) -> &str;
}

/// Truncate to at most `max` bytes on a char boundary.
fn truncate_body(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

pub struct HttpTransport {
    endpoint: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .user_agent(concat!("doppler-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>) -> Result<TransportResponse> {
        let resp = self
            .client
            .post(self.endpoint.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = match resp.text().await {
            Ok(text) => truncate_body(&text, MAX_BODY_LOG_CHARS),
            Err(e) => format!("[Failed to read response body: {e}]"),
        };
        Ok(TransportResponse { status, body })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
