use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== CCTV Proxy Metrics ====
    pub static ref CCTV_PROXY_REQUESTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "cctv_proxy_requests_total",
                "Stream relay requests by method and outcome",
            ),
            &["method", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CCTV_PROXY_UPSTREAM_DURATION: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "cctv_proxy_upstream_duration_seconds",
                "Time until upstream camera response headers arrive",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["kind"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CCTV_PROXY_PLAYLISTS_REWRITTEN: IntCounter = {
        let metric = IntCounter::new(
            "cctv_proxy_playlists_rewritten_total",
            "HLS playlists rewritten to route through the proxy",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
