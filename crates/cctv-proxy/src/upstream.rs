//! Outbound HTTP to camera origins.

use anyhow::Context;
use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use std::{io, time::Duration};
use thiserror::Error;
use url::Url;

pub type ByteStream = BoxStream<'static, Result<Bytes, io::Error>>;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("failed to read upstream body: {0}")]
    Body(String),
}

pub enum UpstreamBody {
    Empty,
    Full(Bytes),
    Stream(ByteStream),
}

impl UpstreamBody {
    pub async fn into_bytes(self) -> Result<Bytes, UpstreamError> {
        match self {
            UpstreamBody::Empty => Ok(Bytes::new()),
            UpstreamBody::Full(bytes) => Ok(bytes),
            UpstreamBody::Stream(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| UpstreamError::Body(e.to_string()))?;
                    buf.extend_from_slice(&chunk);
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Whole body as text; invalid UTF-8 is replaced rather than rejected
    /// and a leading byte order mark is dropped
    pub async fn into_text(self) -> Result<String, UpstreamError> {
        let bytes = self.into_bytes().await?;
        let text = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(&bytes[..]);
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    pub fn into_stream(self) -> ByteStream {
        match self {
            UpstreamBody::Empty => futures::stream::empty().boxed(),
            UpstreamBody::Full(bytes) => futures::stream::once(async move { Ok(bytes) }).boxed(),
            UpstreamBody::Stream(stream) => stream,
        }
    }
}

impl std::fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamBody::Empty => f.write_str("Empty"),
            UpstreamBody::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            UpstreamBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: UpstreamBody,
}

/// Fetches a resource from a camera origin. Redirects are followed.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

pub struct HttpUpstreamClient {
    client: reqwest::Client,
}

impl HttpUpstreamClient {
    pub fn new(connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let is_head = request.method == Method::HEAD;
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = if is_head {
            UpstreamBody::Empty
        } else {
            UpstreamBody::Stream(
                response
                    .bytes_stream()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
                    .boxed(),
            )
        };

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
