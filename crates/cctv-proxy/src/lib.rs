pub mod api;
pub mod cameras;
pub mod config;
pub mod error;
pub mod origin;
pub mod playlist;
pub mod relay;
pub mod state;
pub mod upstream;

pub use cameras::{CameraDirectory, InMemoryCameraDirectory, PgCameraDirectory};
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use relay::{ProxyRequestContext, StreamRelay};
pub use state::AppState;
pub use upstream::{HttpUpstreamClient, UpstreamBody, UpstreamClient, UpstreamRequest, UpstreamResponse};
