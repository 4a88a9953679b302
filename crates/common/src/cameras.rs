use serde::{Deserialize, Serialize};

use crate::streams::{classify, StreamType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraStatus {
    #[default]
    Online,
    Offline,
    Maintenance,
}

/// CCTV camera mounted on a project (ship)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub id: String,
    pub name: String,
    /// Operator-supplied playback URL; untrusted
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub status: CameraStatus,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Camera {
    pub fn stream_type(&self) -> StreamType {
        classify(self.stream_url.as_deref())
    }

    pub fn has_stream(&self) -> bool {
        self.stream_url
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false)
    }
}
