pub mod controller;
pub mod engine;
pub mod probe;
pub mod session;

pub use controller::{
    CacheBuster, ClockCacheBuster, PlayerController, PlayerOptions, PlayerState, PreviewMode,
    RecoveryAction, Surface,
};
pub use engine::{CanPlay, EngineError, EngineErrorKind, HlsEngine, MediaHost, HLS_MIME_TYPE};
pub use probe::{HttpStreamProbe, PlayerError, ProbeReport, StreamProbe};
pub use session::PlayerSession;
