//! Camera player state machine.
//!
//! The controller picks a rendering surface from the camera's stream URL and
//! reacts to media events forwarded by the host page. HLS always plays
//! through the authenticated relay, never from the camera directly.

use common::{classify, proxy_stream_path, validation::safe_unix_millis, StreamType};
use tracing::{debug, warn};

use crate::{
    engine::{CanPlay, EngineError, EngineErrorKind, MediaHost, HLS_MIME_TYPE},
    probe::{PlayerError, ProbeReport, StreamProbe},
    session::PlayerSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    #[default]
    Full,
    /// Grid thumbnails; MJPEG cameras show snapshots instead of the live feed
    Compact,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerOptions {
    /// Prepended to relay paths; empty means same origin as the page
    pub api_origin: Option<String>,
    pub preview: PreviewMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerState {
    Loading,
    Playing,
    /// Shown as an overlay with a retry action
    Error(String),
    /// No engine and no native HLS support; terminal until remount
    Unsupported,
    NotConfigured,
}

/// What the host should render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    None,
    Video { source: String, native: bool },
    Image { src: String },
    Frame { src: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    RestartLoad,
    RecoverMedia,
    /// Session torn down; only a manual reload brings playback back
    ReloadRequired,
    ClearBanner,
}

pub trait CacheBuster {
    fn next_token(&mut self) -> String;
}

/// Millisecond timestamps, strictly increasing within one player
#[derive(Debug, Default)]
pub struct ClockCacheBuster {
    last: u64,
}

impl CacheBuster for ClockCacheBuster {
    fn next_token(&mut self) -> String {
        let now = safe_unix_millis().max(self.last + 1);
        self.last = now;
        now.to_string()
    }
}

fn with_cache_buster(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}t={}", url, sep, token)
        }
        None => url.to_string(),
    }
}

pub struct PlayerController<H: MediaHost> {
    camera_id: String,
    options: PlayerOptions,
    host: H,
    stream_url: Option<String>,
    stream_type: StreamType,
    session: Option<PlayerSession>,
    state: PlayerState,
    surface: Surface,
    banner: Option<String>,
    cache_buster: Box<dyn CacheBuster>,
}

impl<H: MediaHost> PlayerController<H> {
    pub fn new(camera_id: impl Into<String>, options: PlayerOptions, host: H) -> Self {
        Self {
            camera_id: camera_id.into(),
            options,
            host,
            stream_url: None,
            stream_type: StreamType::Iframe,
            session: None,
            state: PlayerState::NotConfigured,
            surface: Surface::None,
            banner: None,
            cache_buster: Box::new(ClockCacheBuster::default()),
        }
    }

    pub fn with_cache_buster(mut self, cache_buster: Box<dyn CacheBuster>) -> Self {
        self.cache_buster = cache_buster;
        self
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Transient engine message shown over a playing stream
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Relay URL for this camera
    pub fn proxy_url(&self) -> String {
        let origin = self
            .options
            .api_origin
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/');
        format!("{}{}", origin, proxy_stream_path(&self.camera_id))
    }

    /// Still-image endpoint served by the dashboard backend, not by the relay
    fn snapshot_url(&self) -> String {
        let origin = self
            .options
            .api_origin
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/');
        format!("{}/api/cctv/{}/snapshot", origin, self.camera_id)
    }

    pub fn mount(&mut self, stream_url: Option<&str>) {
        self.stream_url = stream_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        self.build(None);
    }

    /// Rebuilds only when the URL actually changed
    pub fn set_stream_url(&mut self, stream_url: Option<&str>) {
        let next = stream_url.map(str::trim).filter(|u| !u.is_empty());
        if next == self.stream_url.as_deref() {
            return;
        }
        self.mount(next);
    }

    fn dispose_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.dispose();
        }
    }

    /// Stop the video element from loading whatever it was last given
    fn release_media_source(&mut self) {
        if matches!(self.surface, Surface::Video { .. }) {
            self.host.set_media_source(None);
        }
        self.surface = Surface::None;
    }

    fn build(&mut self, cache_token: Option<String>) {
        self.dispose_session();
        self.release_media_source();
        self.banner = None;

        let Some(raw) = self.stream_url.clone() else {
            self.stream_type = classify(None);
            self.state = PlayerState::NotConfigured;
            self.surface = Surface::None;
            return;
        };

        self.stream_type = classify(Some(&raw));
        self.state = PlayerState::Loading;
        let token = cache_token.as_deref();

        match self.stream_type {
            StreamType::Hls => {
                let source = with_cache_buster(&self.proxy_url(), token);
                if self.host.engine_supported() {
                    let mut engine = self.host.create_engine();
                    engine.attach_media();
                    engine.load_source(&source);
                    self.session = Some(PlayerSession::new(engine));
                    self.surface = Surface::Video {
                        source,
                        native: false,
                    };
                } else if self.host.can_play_type(HLS_MIME_TYPE) == CanPlay::Probably {
                    self.host.set_media_source(Some(&source));
                    self.surface = Surface::Video {
                        source,
                        native: true,
                    };
                } else {
                    warn!(camera_id = %self.camera_id, "no HLS playback available");
                    self.state = PlayerState::Unsupported;
                    self.surface = Surface::None;
                }
            }
            StreamType::Mjpeg => {
                let src = match self.options.preview {
                    PreviewMode::Compact => self.snapshot_url(),
                    PreviewMode::Full => raw,
                };
                self.surface = Surface::Image {
                    src: with_cache_buster(&src, token),
                };
            }
            StreamType::Iframe => {
                self.surface = Surface::Frame {
                    src: with_cache_buster(&raw, token),
                };
            }
        }

        debug!(camera_id = %self.camera_id, stream_type = %self.stream_type, "player mounted");
    }

    fn mark_playing(&mut self) {
        if self.state == PlayerState::Loading {
            self.state = PlayerState::Playing;
        }
    }

    pub fn on_manifest_parsed(&mut self) {
        if self.stream_type.is_hls() {
            self.mark_playing();
        }
    }

    /// First decoded frame of the video element
    pub fn on_media_ready(&mut self) {
        self.mark_playing();
    }

    pub fn on_media_error(&mut self, message: impl Into<String>) {
        self.state = PlayerState::Error(message.into());
    }

    /// Image or frame finished loading
    pub fn on_frame_load(&mut self) {
        if matches!(self.surface, Surface::Image { .. } | Surface::Frame { .. }) {
            self.mark_playing();
        }
    }

    pub fn on_frame_error(&mut self) {
        if matches!(self.surface, Surface::Image { .. } | Surface::Frame { .. }) {
            self.state = PlayerState::Error("Unable to load stream".to_string());
        }
    }

    pub fn on_engine_error(&mut self, error: &EngineError) -> RecoveryAction {
        if !error.fatal {
            self.banner = None;
            return RecoveryAction::ClearBanner;
        }

        warn!(camera_id = %self.camera_id, kind = ?error.kind, details = %error.details, "fatal engine error");

        if let Some(engine) = self.session.as_mut().and_then(|s| s.engine_mut()) {
            match error.kind {
                EngineErrorKind::Network => {
                    engine.start_load();
                    self.banner = Some("Network error, reconnecting".to_string());
                    return RecoveryAction::RestartLoad;
                }
                EngineErrorKind::Media => {
                    engine.recover_media_error();
                    self.banner = Some("Media error, recovering".to_string());
                    return RecoveryAction::RecoverMedia;
                }
                EngineErrorKind::Other => {}
            }
        }

        self.dispose_session();
        self.state = PlayerState::Error(format!("Playback failed: {}", error.details));
        RecoveryAction::ReloadRequired
    }

    /// Tear down and remount with a cache-busted source
    pub fn refresh(&mut self) {
        let token = self.cache_buster.next_token();
        self.build(Some(token));
    }

    pub fn retry(&mut self) {
        self.refresh();
    }

    /// URL to open in a new top-level browsing context (embedded pages only)
    pub fn pop_out(&self) -> Option<String> {
        match self.surface {
            Surface::Frame { .. } => self.stream_url.clone(),
            _ => None,
        }
    }

    pub async fn diagnose(&self, probe: &dyn StreamProbe) -> Result<ProbeReport, PlayerError> {
        if self.stream_url.is_none() {
            return Err(PlayerError::NotConfigured);
        }
        if !self.stream_type.is_hls() {
            return Err(PlayerError::NotDiagnosable(self.stream_type));
        }
        probe.head(&self.proxy_url()).await
    }

    pub fn unmount(&mut self) {
        self.dispose_session();
        self.release_media_source();
    }
}

impl<H: MediaHost> Drop for PlayerController<H> {
    fn drop(&mut self) {
        self.dispose_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HlsEngine;
    use async_trait::async_trait;
    use std::{cell::RefCell, rc::Rc};

    type Log = Rc<RefCell<Vec<String>>>;

    struct FakeEngine {
        id: usize,
        log: Log,
    }

    impl HlsEngine for FakeEngine {
        fn attach_media(&mut self) {
            self.log.borrow_mut().push(format!("engine{}:attach", self.id));
        }
        fn load_source(&mut self, url: &str) {
            self.log.borrow_mut().push(format!("engine{}:load {}", self.id, url));
        }
        fn start_load(&mut self) {
            self.log.borrow_mut().push(format!("engine{}:start_load", self.id));
        }
        fn recover_media_error(&mut self) {
            self.log.borrow_mut().push(format!("engine{}:recover", self.id));
        }
        fn destroy(&mut self) {
            self.log.borrow_mut().push(format!("engine{}:destroy", self.id));
        }
    }

    struct FakeHost {
        engine: bool,
        native: CanPlay,
        created: usize,
        log: Log,
    }

    impl FakeHost {
        fn new(engine: bool, native: CanPlay) -> (Self, Log) {
            let log = Log::default();
            (
                Self {
                    engine,
                    native,
                    created: 0,
                    log: log.clone(),
                },
                log,
            )
        }
    }

    impl MediaHost for FakeHost {
        fn engine_supported(&self) -> bool {
            self.engine
        }
        fn create_engine(&mut self) -> Box<dyn HlsEngine> {
            self.created += 1;
            Box::new(FakeEngine {
                id: self.created,
                log: self.log.clone(),
            })
        }
        fn can_play_type(&self, _mime: &str) -> CanPlay {
            self.native
        }
        fn set_media_source(&mut self, source: Option<&str>) {
            self.log
                .borrow_mut()
                .push(format!("media:src {}", source.unwrap_or("<none>")));
        }
    }

    struct Counter(u32);

    impl CacheBuster for Counter {
        fn next_token(&mut self) -> String {
            self.0 += 1;
            self.0.to_string()
        }
    }

    const HLS_URL: &str = "https://cam.local/live/index.m3u8";

    fn controller(host: FakeHost) -> PlayerController<FakeHost> {
        PlayerController::new("cam-1", PlayerOptions::default(), host)
            .with_cache_buster(Box::new(Counter(0)))
    }

    #[test]
    fn test_hls_uses_relay_not_camera() {
        let (host, log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));

        assert_eq!(player.state(), &PlayerState::Loading);
        assert_eq!(
            player.surface(),
            &Surface::Video {
                source: "/api/cctv/cam-1/stream".to_string(),
                native: false
            }
        );
        assert_eq!(
            *log.borrow(),
            vec!["engine1:attach", "engine1:load /api/cctv/cam-1/stream"]
        );

        player.on_manifest_parsed();
        assert_eq!(player.state(), &PlayerState::Playing);
    }

    #[test]
    fn test_api_origin_prefix() {
        let (host, _log) = FakeHost::new(true, CanPlay::No);
        let options = PlayerOptions {
            api_origin: Some("https://api.navisight.example/".to_string()),
            preview: PreviewMode::Full,
        };
        let player = PlayerController::new("cam-1", options, host);
        assert_eq!(
            player.proxy_url(),
            "https://api.navisight.example/api/cctv/cam-1/stream"
        );
    }

    #[test]
    fn test_native_fallback_and_unsupported() {
        let (host, log) = FakeHost::new(false, CanPlay::Probably);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        assert!(matches!(player.surface(), Surface::Video { native: true, .. }));
        assert!(!player.has_session());
        assert_eq!(*log.borrow(), vec!["media:src /api/cctv/cam-1/stream"]);

        let (host, _log) = FakeHost::new(false, CanPlay::Maybe);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        assert_eq!(player.state(), &PlayerState::Unsupported);
        assert_eq!(player.surface(), &Surface::None);
    }

    #[test]
    fn test_engine_error_recovery() {
        let (host, log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        log.borrow_mut().clear();

        let action = player.on_engine_error(&EngineError::fatal(EngineErrorKind::Network, "timeout"));
        assert_eq!(action, RecoveryAction::RestartLoad);
        assert!(player.banner().is_some());

        let action = player.on_engine_error(&EngineError::recoverable(EngineErrorKind::Network, "stall"));
        assert_eq!(action, RecoveryAction::ClearBanner);
        assert!(player.banner().is_none());

        let action = player.on_engine_error(&EngineError::fatal(EngineErrorKind::Media, "decode"));
        assert_eq!(action, RecoveryAction::RecoverMedia);

        let action = player.on_engine_error(&EngineError::fatal(EngineErrorKind::Other, "internal"));
        assert_eq!(action, RecoveryAction::ReloadRequired);
        assert!(!player.has_session());
        assert!(matches!(player.state(), PlayerState::Error(_)));

        assert_eq!(
            *log.borrow(),
            vec!["engine1:start_load", "engine1:recover", "engine1:destroy"]
        );
    }

    #[test]
    fn test_url_change_disposes_before_new_engine() {
        let (host, log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        player.set_stream_url(Some(HLS_URL));
        assert_eq!(log.borrow().len(), 2, "unchanged url must not rebuild");

        player.set_stream_url(Some("https://cam.local/live/alt.m3u8"));
        let log = log.borrow();
        assert_eq!(log[2], "engine1:destroy");
        assert_eq!(log[3], "media:src <none>");
        assert_eq!(log[4], "engine2:attach");
    }

    #[test]
    fn test_native_video_released_when_switching_to_mjpeg() {
        let (host, log) = FakeHost::new(false, CanPlay::Probably);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        player.set_stream_url(Some("http://cam.local/mjpg/video.cgi"));

        assert!(matches!(player.surface(), Surface::Image { .. }));
        assert_eq!(
            *log.borrow(),
            vec!["media:src /api/cctv/cam-1/stream", "media:src <none>"]
        );

        player.unmount();
        assert_eq!(log.borrow().len(), 2, "image surface has no media source to clear");
    }

    #[test]
    fn test_refresh_is_cache_busted() {
        let (host, log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        player.on_manifest_parsed();
        player.refresh();

        assert_eq!(player.state(), &PlayerState::Loading);
        assert_eq!(
            log.borrow()[2..].to_vec(),
            vec![
                "engine1:destroy",
                "media:src <none>",
                "engine2:attach",
                "engine2:load /api/cctv/cam-1/stream?t=1",
            ]
        );

        player.retry();
        assert!(matches!(
            player.surface(),
            Surface::Video { source, .. } if source.ends_with("?t=2")
        ));
    }

    #[test]
    fn test_mjpeg_surfaces() {
        let url = "http://cam.local/axis-cgi/mjpg/video.cgi?resolution=640x480";
        let (host, _log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(url));
        assert_eq!(player.surface(), &Surface::Image { src: url.to_string() });
        assert!(!player.has_session());

        player.on_frame_error();
        assert!(matches!(player.state(), PlayerState::Error(_)));
        player.retry();
        assert_eq!(
            player.surface(),
            &Surface::Image {
                src: format!("{}&t=1", url)
            }
        );
        player.on_frame_load();
        assert_eq!(player.state(), &PlayerState::Playing);

        let (host, _log) = FakeHost::new(true, CanPlay::No);
        let options = PlayerOptions {
            api_origin: None,
            preview: PreviewMode::Compact,
        };
        let mut player = PlayerController::new("cam-2", options, host);
        player.mount(Some(url));
        assert_eq!(
            player.surface(),
            &Surface::Image {
                src: "/api/cctv/cam-2/snapshot".to_string()
            }
        );
    }

    #[test]
    fn test_iframe_and_pop_out() {
        let url = "https://vendor.example/viewer/42";
        let (host, _log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(url));

        assert_eq!(player.surface(), &Surface::Frame { src: url.to_string() });
        assert_eq!(player.pop_out().as_deref(), Some(url));
        player.on_frame_load();
        assert_eq!(player.state(), &PlayerState::Playing);

        player.refresh();
        assert_eq!(
            player.surface(),
            &Surface::Frame {
                src: format!("{}?t=1", url)
            }
        );

        let (host, _log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        assert_eq!(player.pop_out(), None);
    }

    #[test]
    fn test_missing_url_is_not_configured() {
        let (host, log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(None);
        assert_eq!(player.state(), &PlayerState::NotConfigured);
        player.mount(Some("   "));
        assert_eq!(player.state(), &PlayerState::NotConfigured);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_unmount_and_drop_dispose() {
        let (host, log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        player.unmount();
        assert_eq!(player.surface(), &Surface::None);
        drop(player);
        let destroys = log.borrow().iter().filter(|l| l.ends_with(":destroy")).count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn test_clock_cache_buster_increases() {
        let mut buster = ClockCacheBuster::default();
        let a: u64 = buster.next_token().parse().unwrap();
        let b: u64 = buster.next_token().parse().unwrap();
        assert!(b > a);
    }

    struct FixedProbe;

    #[async_trait]
    impl StreamProbe for FixedProbe {
        async fn head(&self, url: &str) -> Result<ProbeReport, PlayerError> {
            assert_eq!(url, "/api/cctv/cam-1/stream");
            Ok(ProbeReport {
                proxy_status: 404,
                upstream_status: Some(404),
            })
        }
    }

    #[tokio::test]
    async fn test_diagnose() {
        let (host, _log) = FakeHost::new(true, CanPlay::No);
        let mut player = controller(host);
        player.mount(Some(HLS_URL));
        let report = player.diagnose(&FixedProbe).await.unwrap();
        assert_eq!(report.upstream_status, Some(404));
        assert!(!report.is_healthy());

        player.mount(Some("https://vendor.example/viewer"));
        assert!(matches!(
            player.diagnose(&FixedProbe).await,
            Err(PlayerError::NotDiagnosable(StreamType::Iframe))
        ));

        player.mount(None);
        assert!(matches!(
            player.diagnose(&FixedProbe).await,
            Err(PlayerError::NotConfigured)
        ));
    }
}
