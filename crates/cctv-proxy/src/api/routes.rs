use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use common::{proxy_stream_path, RequireSession};
use serde::Deserialize;
use telemetry::metrics::CCTV_PROXY_REQUESTS;
use tracing::{error, info_span, warn, Instrument};

use crate::{error::ProxyError, origin::resolve_public_origin, state::AppState};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub resource: Option<String>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics() -> Response {
    match telemetry::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// CORS preflight for the stream route
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, HEAD, OPTIONS")),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*")),
            (header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600")),
        ],
    )
}

async fn relay_stream(
    state: &AppState,
    camera_id: &str,
    resource: Option<&str>,
    method: Method,
    headers: &HeaderMap,
) -> Result<Response, ProxyError> {
    let ctx = state.relay.prepare(camera_id, resource, method).await?;
    let proxy_base = format!(
        "{}{}",
        resolve_public_origin(headers, &state.public_base_url),
        proxy_stream_path(camera_id)
    );
    state.relay.relay(&ctx, &proxy_base).await
}

/// GET/HEAD /api/cctv/:camera_id/stream[?resource=<url>]
pub async fn proxy_stream(
    State(state): State<AppState>,
    RequireSession(user): RequireSession,
    method: Method,
    Path(camera_id): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Response {
    let span = info_span!("cctv_stream", camera_id = %camera_id, user_id = %user.user_id);

    let result = relay_stream(
        &state,
        &camera_id,
        query.resource.as_deref(),
        method.clone(),
        &headers,
    )
    .instrument(span)
    .await;

    match result {
        Ok(response) => {
            CCTV_PROXY_REQUESTS
                .with_label_values(&[method.as_str(), "ok"])
                .inc();
            response
        }
        Err(err) => {
            CCTV_PROXY_REQUESTS
                .with_label_values(&[method.as_str(), err.outcome()])
                .inc();
            match &err {
                ProxyError::ProxyFailure(reason) => {
                    error!(camera_id = %camera_id, error = %reason, "stream proxy failure")
                }
                other if other.is_server_side() => {
                    warn!(camera_id = %camera_id, error = %other, "stream relay failed")
                }
                other => warn!(camera_id = %camera_id, error = %other, "stream request rejected"),
            }
            err.into_response()
        }
    }
}
