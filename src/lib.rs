//! NaviSight CCTV streaming: stream classification, the authenticated HLS
//! relay and the dashboard player controller.

pub use cctv_proxy as proxy;
pub use common;
pub use stream_player as player;
pub use telemetry;
