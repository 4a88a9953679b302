use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::correlation::{extract_or_generate_correlation_id, CorrelationId, X_CORRELATION_ID};

/// Axum middleware that logs every request with its latency and echoes the
/// correlation id back to the caller.
pub async fn trace_http_request(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let correlation_id = req
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.0.clone())
        .unwrap_or_else(|| extract_or_generate_correlation_id(req.headers()));

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        correlation_id = %correlation_id,
    );

    let mut response = next.run(req).instrument(span).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    match status {
        500..=599 => error!(
            method = %method, path = %path, status, latency_ms, correlation_id = %correlation_id,
            "HTTP request failed (server error)"
        ),
        400..=499 => warn!(
            method = %method, path = %path, status, latency_ms, correlation_id = %correlation_id,
            "HTTP request failed (client error)"
        ),
        _ => info!(
            method = %method, path = %path, status, latency_ms, correlation_id = %correlation_id,
            "HTTP request completed"
        ),
    }

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(X_CORRELATION_ID, value);
    }

    response
}
