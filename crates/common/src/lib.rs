pub mod cameras;
pub mod session;
pub mod streams;
pub mod validation;

pub use cameras::{Camera, CameraStatus};
pub use session::{JwtSessionVerifier, RequireSession, SessionVerifier, UserIdentity, UserRole};
pub use streams::{classify, proxy_stream_path, StreamType};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
