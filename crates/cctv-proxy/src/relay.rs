//! HLS relay between the dashboard player and camera origins.
//!
//! A request is first resolved into a [`ProxyRequestContext`] without any
//! network I/O, so every rejection (bad id, unknown camera, foreign origin)
//! happens before the camera is contacted.

use axum::{
    body::Body,
    http::{
        header::{self, HeaderName},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use common::{classify, validation};
use std::{sync::Arc, time::Instant};
use telemetry::metrics::{CCTV_PROXY_PLAYLISTS_REWRITTEN, CCTV_PROXY_UPSTREAM_DURATION};
use tracing::{debug, warn};
use url::Url;

use crate::{
    cameras::CameraDirectory,
    error::{ProxyError, X_UPSTREAM_STATUS},
    origin::{origin_of, same_origin},
    playlist::{is_manifest_document, rewrite_playlist},
    upstream::{UpstreamClient, UpstreamRequest},
};

pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

const MANIFEST_ACCEPT: &str = "application/vnd.apple.mpegurl, application/x-mpegurl, */*;q=0.8";

/// A validated relay request, ready to be sent upstream
#[derive(Debug, Clone)]
pub struct ProxyRequestContext {
    pub camera_id: String,
    pub base_stream_url: Url,
    pub requested_resource: Option<Url>,
    pub method: Method,
}

impl ProxyRequestContext {
    /// The URL actually fetched: the requested resource, else the camera's stream
    pub fn target(&self) -> &Url {
        self.requested_resource
            .as_ref()
            .unwrap_or(&self.base_stream_url)
    }
}

fn is_manifest_path(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".m3u8")
}

fn is_manifest_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("mpegurl"))
        .unwrap_or(false)
}

pub struct StreamRelay {
    cameras: Arc<dyn CameraDirectory>,
    upstream: Arc<dyn UpstreamClient>,
    user_agent: HeaderValue,
}

impl StreamRelay {
    pub fn new(
        cameras: Arc<dyn CameraDirectory>,
        upstream: Arc<dyn UpstreamClient>,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| anyhow::anyhow!("invalid upstream user agent: {}", e))?;
        Ok(Self {
            cameras,
            upstream,
            user_agent,
        })
    }

    /// Resolve and validate a relay request. Never contacts the camera.
    pub async fn prepare(
        &self,
        camera_id: &str,
        resource: Option<&str>,
        method: Method,
    ) -> Result<ProxyRequestContext, ProxyError> {
        validation::validate_id(camera_id, "camera id")
            .map_err(|e| ProxyError::InvalidCameraId(e.to_string()))?;

        let stored = self
            .cameras
            .stream_url(camera_id)
            .await
            .map_err(|e| ProxyError::failure(format!("camera lookup failed: {:#}", e)))?
            .ok_or(ProxyError::NotConfigured)?;

        let stream_type = classify(Some(&stored));
        if !stream_type.is_hls() {
            return Err(ProxyError::UnsupportedStreamType(stream_type));
        }

        let base_stream_url = Url::parse(stored.trim())
            .map_err(|e| ProxyError::failure(format!("stored stream url is invalid: {}", e)))?;

        let requested_resource = match resource.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => {
                validation::validate_uri(raw, "resource")
                    .map_err(|e| ProxyError::InvalidResource(e.to_string()))?;
                let url = Url::parse(raw).map_err(|e| ProxyError::InvalidResource(e.to_string()))?;
                if !same_origin(&url, &base_stream_url) {
                    return Err(ProxyError::OriginMismatch {
                        resource: origin_of(&url),
                        camera: origin_of(&base_stream_url),
                    });
                }
                Some(url)
            }
            None => None,
        };

        Ok(ProxyRequestContext {
            camera_id: camera_id.to_string(),
            base_stream_url,
            requested_resource,
            method,
        })
    }

    fn upstream_headers(&self, target: &Url) -> HeaderMap {
        let origin = origin_of(target);
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, self.user_agent.clone());
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(if is_manifest_path(target) {
                MANIFEST_ACCEPT
            } else {
                "*/*"
            }),
        );
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/", origin)) {
            headers.insert(header::REFERER, referer);
        }
        if let Ok(origin) = HeaderValue::from_str(&origin) {
            headers.insert(header::ORIGIN, origin);
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers
    }

    /// Fetch the target and turn the camera's answer into a client response.
    ///
    /// `proxy_base` is the absolute relay URL for this camera; rewritten
    /// playlists point every reference back at it.
    pub async fn relay(
        &self,
        ctx: &ProxyRequestContext,
        proxy_base: &str,
    ) -> Result<Response, ProxyError> {
        let target = ctx.target();
        let manifest_path = is_manifest_path(target);
        let kind = if manifest_path { "manifest" } else { "resource" };

        debug!(camera_id = %ctx.camera_id, target = %target, method = %ctx.method, "fetching upstream");

        let started = Instant::now();
        let result = self
            .upstream
            .fetch(UpstreamRequest {
                method: ctx.method.clone(),
                url: target.clone(),
                headers: self.upstream_headers(target),
            })
            .await;
        CCTV_PROXY_UPSTREAM_DURATION
            .with_label_values(&[kind])
            .observe(started.elapsed().as_secs_f64());

        let upstream = result.map_err(|e| ProxyError::failure(e.to_string()))?;
        let status = upstream.status;
        let upstream_status = (
            HeaderName::from_static(X_UPSTREAM_STATUS),
            HeaderValue::from(status.as_u16()),
        );

        if ctx.method == Method::HEAD {
            let mut response = (status, [upstream_status]).into_response();
            if let Some(ct) = upstream
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
            {
                response.headers_mut().insert(header::CONTENT_TYPE, ct);
            }
            return Ok(response);
        }

        if !status.is_success() {
            warn!(camera_id = %ctx.camera_id, target = %target, status = status.as_u16(), "upstream returned error status");
            let body = upstream
                .body
                .into_bytes()
                .await
                .unwrap_or_else(|_| Bytes::from_static(b"Upstream error"));
            return Err(ProxyError::Upstream {
                status,
                content_type: upstream.content_type,
                body,
            });
        }

        if manifest_path || is_manifest_content_type(upstream.content_type.as_deref()) {
            let text = upstream
                .body
                .into_text()
                .await
                .map_err(|e| ProxyError::failure(e.to_string()))?;

            if !is_manifest_document(&text) {
                return Err(ProxyError::invalid_manifest(status, &text));
            }

            let rewritten = rewrite_playlist(&text, target, proxy_base);
            CCTV_PROXY_PLAYLISTS_REWRITTEN.inc();
            return Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static(HLS_CONTENT_TYPE))],
                rewritten,
            )
                .into_response());
        }

        let content_type = upstream
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
            .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

        Ok((
            status,
            [(header::CONTENT_TYPE, content_type)],
            Body::from_stream(upstream.body.into_stream()),
        )
            .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cameras::InMemoryCameraDirectory,
        upstream::{UpstreamBody, UpstreamError, UpstreamResponse},
    };
    use async_trait::async_trait;
    use common::{Camera, CameraStatus, StreamType};
    use std::sync::Mutex;

    const PROXY_BASE: &str = "https://navisight.example/api/cctv/cam-1/stream";

    #[derive(Default)]
    struct RecordingUpstream {
        requests: Mutex<Vec<UpstreamRequest>>,
        status: Option<StatusCode>,
        content_type: Option<&'static str>,
        body: &'static str,
    }

    impl RecordingUpstream {
        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UpstreamClient for RecordingUpstream {
        async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
            self.requests.lock().unwrap().push(request);
            Ok(UpstreamResponse {
                status: self.status.unwrap_or(StatusCode::OK),
                content_type: self.content_type.map(str::to_string),
                body: UpstreamBody::Full(Bytes::from_static(self.body.as_bytes())),
            })
        }
    }

    fn camera(id: &str, url: Option<&str>) -> Camera {
        Camera {
            id: id.to_string(),
            name: id.to_string(),
            stream_url: url.map(str::to_string),
            status: CameraStatus::Online,
            project_id: None,
        }
    }

    fn relay_with(upstream: Arc<RecordingUpstream>) -> StreamRelay {
        let cameras = InMemoryCameraDirectory::from_cameras([
            camera("cam-1", Some("https://cam.local/live/index.m3u8")),
            camera("cam-mjpeg", Some("http://cam.local/axis-cgi/mjpg/video.cgi")),
            camera("cam-none", None),
            camera("cam-broken", Some("/hls/relative.m3u8")),
        ]);
        StreamRelay::new(Arc::new(cameras), upstream, "test-agent/1.0").unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_prepare_defaults_to_camera_stream() {
        let relay = relay_with(Arc::new(RecordingUpstream::default()));
        let ctx = relay.prepare("cam-1", None, Method::GET).await.unwrap();
        assert_eq!(ctx.target().as_str(), "https://cam.local/live/index.m3u8");

        let ctx = relay.prepare("cam-1", Some(""), Method::GET).await.unwrap();
        assert!(ctx.requested_resource.is_none());
    }

    #[tokio::test]
    async fn test_prepare_rejections() {
        let relay = relay_with(Arc::new(RecordingUpstream::default()));

        assert!(matches!(
            relay.prepare("../etc", None, Method::GET).await,
            Err(ProxyError::InvalidCameraId(_))
        ));
        assert!(matches!(
            relay.prepare("cam-none", None, Method::GET).await,
            Err(ProxyError::NotConfigured)
        ));
        assert!(matches!(
            relay.prepare("unknown", None, Method::GET).await,
            Err(ProxyError::NotConfigured)
        ));
        assert!(matches!(
            relay.prepare("cam-mjpeg", None, Method::GET).await,
            Err(ProxyError::UnsupportedStreamType(StreamType::Mjpeg))
        ));
        assert!(matches!(
            relay.prepare("cam-broken", None, Method::GET).await,
            Err(ProxyError::ProxyFailure(_))
        ));
        assert!(matches!(
            relay.prepare("cam-1", Some("seg0.ts"), Method::GET).await,
            Err(ProxyError::InvalidResource(_))
        ));
        assert!(matches!(
            relay.prepare("cam-1", Some("https://evil.example/x.ts"), Method::GET).await,
            Err(ProxyError::OriginMismatch { .. })
        ));
        assert!(matches!(
            relay.prepare("cam-1", Some("https://cam.local:8443/x.ts"), Method::GET).await,
            Err(ProxyError::OriginMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_manifest_is_rewritten() {
        let upstream = Arc::new(RecordingUpstream {
            body: "#EXTM3U\n#EXT-X-VERSION:3\nseg0.ts\n",
            ..Default::default()
        });
        let relay = relay_with(upstream.clone());
        let ctx = relay.prepare("cam-1", None, Method::GET).await.unwrap();
        let response = relay.relay(&ctx, PROXY_BASE).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], HLS_CONTENT_TYPE);
        assert_eq!(
            body_text(response).await,
            format!(
                "#EXTM3U\n#EXT-X-VERSION:3\n{}?resource=https%3A%2F%2Fcam.local%2Flive%2Fseg0.ts\n",
                PROXY_BASE
            )
        );

        let requests = upstream.requests.lock().unwrap();
        let headers = &requests[0].headers;
        assert_eq!(headers[header::USER_AGENT], "test-agent/1.0");
        assert_eq!(headers[header::REFERER], "https://cam.local/");
        assert_eq!(headers[header::ORIGIN], "https://cam.local");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert!(headers[header::ACCEPT]
            .to_str()
            .unwrap()
            .starts_with(HLS_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn test_manifest_with_byte_order_mark_is_rewritten() {
        let upstream = Arc::new(RecordingUpstream {
            body: "\u{feff}#EXTM3U\nseg0.ts\n",
            content_type: Some("application/vnd.apple.mpegurl"),
            ..Default::default()
        });
        let relay = relay_with(upstream);
        let ctx = relay.prepare("cam-1", None, Method::GET).await.unwrap();
        let response = relay.relay(&ctx, PROXY_BASE).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            format!(
                "#EXTM3U\n{}?resource=https%3A%2F%2Fcam.local%2Flive%2Fseg0.ts\n",
                PROXY_BASE
            )
        );
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_reported() {
        let upstream = Arc::new(RecordingUpstream {
            body: "<html>login required</html>",
            content_type: Some("text/html"),
            ..Default::default()
        });
        let relay = relay_with(upstream);
        let ctx = relay.prepare("cam-1", None, Method::GET).await.unwrap();

        match relay.relay(&ctx, PROXY_BASE).await {
            Err(ProxyError::InvalidManifest { status, preview }) => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(preview, "<html>login required</html>");
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(response) => panic!("unexpected status {}", response.status()),
        }
    }

    #[tokio::test]
    async fn test_head_is_never_rewritten() {
        let upstream = Arc::new(RecordingUpstream {
            status: Some(StatusCode::NOT_FOUND),
            ..Default::default()
        });
        let relay = relay_with(upstream.clone());
        let ctx = relay.prepare("cam-1", None, Method::HEAD).await.unwrap();
        let response = relay.relay(&ctx, PROXY_BASE).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[X_UPSTREAM_STATUS], "404");
        assert_eq!(upstream.requests.lock().unwrap()[0].method, Method::HEAD);
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_segment_is_streamed_through() {
        let upstream = Arc::new(RecordingUpstream {
            body: "binary-segment",
            content_type: Some("video/mp2t"),
            ..Default::default()
        });
        let relay = relay_with(upstream.clone());
        let ctx = relay
            .prepare("cam-1", Some("https://cam.local/live/seg0.ts"), Method::GET)
            .await
            .unwrap();
        let response = relay.relay(&ctx, PROXY_BASE).await.unwrap();

        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp2t");
        assert_eq!(body_text(response).await, "binary-segment");
        assert_eq!(
            upstream.requests.lock().unwrap()[0].headers[header::ACCEPT],
            "*/*"
        );
    }
}
