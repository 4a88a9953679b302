use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common::StreamType;
use serde_json::json;
use thiserror::Error;

/// Debug header carrying the camera's own response status
pub const X_UPSTREAM_STATUS: &str = "x-upstream-status";

/// Number of body characters echoed back for an invalid manifest
pub const MANIFEST_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid camera id: {0}")]
    InvalidCameraId(String),

    #[error("camera has no stream configured")]
    NotConfigured,

    #[error("proxy only supports HLS streams (camera stream is {0})")]
    UnsupportedStreamType(StreamType),

    #[error("invalid resource url: {0}")]
    InvalidResource(String),

    #[error("resource origin {resource} does not match camera origin {camera}")]
    OriginMismatch { resource: String, camera: String },

    #[error("upstream responded with {status}")]
    Upstream {
        status: StatusCode,
        content_type: Option<String>,
        body: Bytes,
    },

    #[error("upstream returned an invalid HLS manifest (status {status})")]
    InvalidManifest { status: StatusCode, preview: String },

    #[error("unable to proxy stream: {0}")]
    ProxyFailure(String),
}

impl ProxyError {
    pub fn invalid_manifest(status: StatusCode, body: &str) -> Self {
        Self::InvalidManifest {
            status,
            preview: body.chars().take(MANIFEST_PREVIEW_CHARS).collect(),
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self::ProxyFailure(msg.into())
    }

    /// Label used for request metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::Unauthorized => "unauthorized",
            ProxyError::InvalidCameraId(_) => "invalid_camera_id",
            ProxyError::NotConfigured => "not_configured",
            ProxyError::UnsupportedStreamType(_) => "unsupported_stream_type",
            ProxyError::InvalidResource(_) => "invalid_resource",
            ProxyError::OriginMismatch { .. } => "origin_mismatch",
            ProxyError::Upstream { .. } => "upstream_error",
            ProxyError::InvalidManifest { .. } => "invalid_manifest",
            ProxyError::ProxyFailure(_) => "proxy_failure",
        }
    }

    /// Failures on our side of the relay, as opposed to caller mistakes
    pub fn is_server_side(&self) -> bool {
        matches!(
            self,
            ProxyError::Upstream { .. } | ProxyError::InvalidManifest { .. } | ProxyError::ProxyFailure(_)
        )
    }
}

fn json_error(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ProxyError::InvalidCameraId(_) => json_error(StatusCode::BAD_REQUEST, self.to_string()),
            ProxyError::NotConfigured => json_error(StatusCode::NOT_FOUND, "Stream not configured".to_string()),
            ProxyError::UnsupportedStreamType(_) => {
                json_error(StatusCode::BAD_REQUEST, self.to_string())
            }
            ProxyError::InvalidResource(_) => json_error(StatusCode::BAD_REQUEST, self.to_string()),
            ProxyError::OriginMismatch { .. } => {
                json_error(StatusCode::BAD_REQUEST, "Resource origin mismatch".to_string())
            }
            ProxyError::Upstream {
                status,
                content_type,
                body,
            } => {
                let content_type = content_type
                    .and_then(|ct| HeaderValue::from_str(&ct).ok())
                    .unwrap_or_else(|| HeaderValue::from_static("text/plain; charset=utf-8"));
                (
                    status,
                    [
                        (header::CONTENT_TYPE, content_type),
                        (header::HeaderName::from_static(X_UPSTREAM_STATUS), HeaderValue::from(status.as_u16())),
                    ],
                    body,
                )
                    .into_response()
            }
            ProxyError::InvalidManifest { status, preview } => {
                let message = format!(
                    "Upstream returned an invalid HLS manifest (missing #EXTM3U header).\n\
                     Upstream status: {}\n\
                     Body preview:\n{}",
                    status.as_u16(),
                    preview
                );
                (
                    StatusCode::BAD_GATEWAY,
                    [
                        (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
                        (header::HeaderName::from_static(X_UPSTREAM_STATUS), HeaderValue::from(status.as_u16())),
                    ],
                    message,
                )
                    .into_response()
            }
            ProxyError::ProxyFailure(_) => {
                json_error(StatusCode::BAD_GATEWAY, "Unable to proxy stream".to_string())
            }
        }
    }
}
