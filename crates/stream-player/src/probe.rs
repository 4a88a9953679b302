use async_trait::async_trait;
use common::StreamType;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use thiserror::Error;

pub const X_UPSTREAM_STATUS: &str = "x-upstream-status";

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("stream is not configured")]
    NotConfigured,
    #[error("only HLS streams can be diagnosed (stream is {0})")]
    NotDiagnosable(StreamType),
    #[error("probe failed: {0}")]
    Probe(String),
}

/// Result of a `HEAD` against the stream relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub proxy_status: u16,
    /// Status the camera gave the relay, when the relay got that far
    pub upstream_status: Option<u16>,
}

impl ProbeReport {
    pub fn is_healthy(&self) -> bool {
        (200..300).contains(&self.proxy_status)
    }
}

#[async_trait]
pub trait StreamProbe: Send + Sync {
    async fn head(&self, url: &str) -> Result<ProbeReport, PlayerError>;
}

pub struct HttpStreamProbe {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpStreamProbe {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

impl Default for HttpStreamProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamProbe for HttpStreamProbe {
    async fn head(&self, url: &str) -> Result<ProbeReport, PlayerError> {
        let mut request = self.client.head(url);
        if let Some(token) = &self.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| PlayerError::Probe(e.to_string()))?;
            request = request.header(AUTHORIZATION, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlayerError::Probe(e.to_string()))?;

        let upstream_status = response
            .headers()
            .get(X_UPSTREAM_STATUS)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        Ok(ProbeReport {
            proxy_status: response.status().as_u16(),
            upstream_status,
        })
    }
}
