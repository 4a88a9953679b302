use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    /// Path served by the CCTV proxy; a URL already routed through it stays HLS.
    static ref PROXY_STREAM_PATH: Regex =
        Regex::new(r"/api/cctv/[^/?#]+/stream").expect("proxy path pattern is valid");
}

const HLS_MARKERS: &[&str] = &[".m3u8", "/hls/", "/hls-", "m3u8"];

const MJPEG_MARKERS: &[&str] = &[
    "mjpg",
    "mjpeg",
    "/mjpeg/",
    "axis-cgi/mjpg",
    "cgi-bin/faststream.jpg",
    "mjpegstream.cgi",
    "mjpg/video.cgi",
    "video.cgi",
    "action=stream",
];

/// How a camera feed is rendered by the dashboard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// HTTP Live Streaming, played through the proxy relay
    Hls,
    /// Motion JPEG, rendered as a self-refreshing image
    Mjpeg,
    /// Anything else, embedded as a frame
    Iframe,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Hls => "hls",
            StreamType::Mjpeg => "mjpeg",
            StreamType::Iframe => "iframe",
        }
    }

    pub fn is_hls(&self) -> bool {
        matches!(self, StreamType::Hls)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of the HLS relay endpoint for a camera
pub fn proxy_stream_path(camera_id: &str) -> String {
    format!("/api/cctv/{}/stream", camera_id)
}

/// Classify a camera's stored stream URL.
///
/// HLS markers are checked before MJPEG markers, so a URL carrying both
/// resolves to [`StreamType::Hls`]. Missing or blank URLs fall back to
/// [`StreamType::Iframe`].
pub fn classify(url: Option<&str>) -> StreamType {
    let url = match url.map(str::trim) {
        Some(u) if !u.is_empty() => u.to_lowercase(),
        _ => return StreamType::Iframe,
    };

    if HLS_MARKERS.iter().any(|m| url.contains(m)) || PROXY_STREAM_PATH.is_match(&url) {
        return StreamType::Hls;
    }

    if MJPEG_MARKERS.iter().any(|m| url.contains(m)) {
        return StreamType::Mjpeg;
    }

    StreamType::Iframe
}
