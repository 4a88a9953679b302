//! Seams between the controller and the page it runs in.

pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Network,
    Media,
    Other,
}

/// Error event raised by an HLS playback engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub fatal: bool,
    pub details: String,
}

impl EngineError {
    pub fn fatal(kind: EngineErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            details: details.into(),
        }
    }

    pub fn recoverable(kind: EngineErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: false,
            details: details.into(),
        }
    }
}

/// A script-driven HLS engine bound to one media element
pub trait HlsEngine {
    fn attach_media(&mut self);
    fn load_source(&mut self, url: &str);
    /// Restart fragment loading after a network failure
    fn start_load(&mut self);
    fn recover_media_error(&mut self);
    /// Release buffers and detach from the media element
    fn destroy(&mut self);
}

/// Answer of the media element's `canPlayType`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanPlay {
    No,
    Maybe,
    Probably,
}

impl CanPlay {
    pub fn parse(answer: &str) -> Self {
        match answer.trim() {
            "probably" => CanPlay::Probably,
            "maybe" => CanPlay::Maybe,
            _ => CanPlay::No,
        }
    }
}

/// The page hosting the player: its media element and engine support
pub trait MediaHost {
    fn engine_supported(&self) -> bool;
    fn create_engine(&mut self) -> Box<dyn HlsEngine>;
    fn can_play_type(&self, mime: &str) -> CanPlay;
    /// Native playback source of the media element; `None` clears it
    fn set_media_source(&mut self, source: Option<&str>);
}
