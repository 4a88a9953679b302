pub mod routes;

use std::convert::Infallible;

use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use telemetry::CorrelationIdLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;
use routes::*;

pub const STREAM_ROUTE: &str = "/api/cctv/:camera_id/stream";

pub fn create_router(state: AppState) -> Router {
    // Error responses from the relay need these too, so they are set on the
    // whole method router rather than in the handler.
    let stream = get(proxy_stream)
        .head(proxy_stream)
        .options(preflight)
        .layer::<_, Infallible>(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer::<_, Infallible>(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route(STREAM_ROUTE, stream)
        .layer(middleware::from_fn(telemetry::trace_http_request))
        .layer(CorrelationIdLayer::new())
        .with_state(state)
}
