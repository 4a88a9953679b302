pub mod correlation;
pub mod http_tracing;
pub mod logging;
pub mod metrics;

pub use correlation::{CorrelationId, CorrelationIdLayer, X_CORRELATION_ID, X_REQUEST_ID};
pub use http_tracing::trace_http_request;
pub use logging::{init_structured_logging, init_with_service, LogConfig, LogFormat, LoggingGuard};
pub use metrics::{encode_metrics, REGISTRY};
