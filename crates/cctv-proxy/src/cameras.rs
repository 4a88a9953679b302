use anyhow::{Context, Result};
use async_trait::async_trait;
use common::Camera;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{collections::HashMap, path::Path, sync::Arc};
use tokio::sync::RwLock;

/// Lookup of the stored stream URL for a camera
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    /// `Ok(None)` when the camera is unknown or has no stream URL
    async fn stream_url(&self, camera_id: &str) -> Result<Option<String>>;
}

#[derive(Clone, Default)]
pub struct InMemoryCameraDirectory {
    cameras: Arc<RwLock<HashMap<String, Camera>>>,
}

impl InMemoryCameraDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cameras(cameras: impl IntoIterator<Item = Camera>) -> Self {
        let map = cameras.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            cameras: Arc::new(RwLock::new(map)),
        }
    }

    /// Load a JSON array of cameras
    pub async fn load_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read camera file {}", path.display()))?;
        let cameras: Vec<Camera> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse camera file {}", path.display()))?;
        Ok(Self::from_cameras(cameras))
    }

    pub async fn insert(&self, camera: Camera) {
        self.cameras.write().await.insert(camera.id.clone(), camera);
    }

    pub async fn remove(&self, camera_id: &str) -> Option<Camera> {
        self.cameras.write().await.remove(camera_id)
    }

    pub async fn len(&self) -> usize {
        self.cameras.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cameras.read().await.is_empty()
    }
}

#[async_trait]
impl CameraDirectory for InMemoryCameraDirectory {
    async fn stream_url(&self, camera_id: &str) -> Result<Option<String>> {
        let cameras = self.cameras.read().await;
        Ok(cameras
            .get(camera_id)
            .filter(|c| c.has_stream())
            .and_then(|c| c.stream_url.clone()))
    }
}

/// Cameras table shared with the dashboard backend
#[derive(Clone)]
pub struct PgCameraDirectory {
    pool: PgPool,
}

impl PgCameraDirectory {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to database")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CameraDirectory for PgCameraDirectory {
    async fn stream_url(&self, camera_id: &str) -> Result<Option<String>> {
        let url = sqlx::query_scalar::<_, Option<String>>(
            "SELECT stream_url FROM cameras WHERE id = $1",
        )
        .bind(camera_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up camera stream url")?
        .flatten()
        .filter(|u| !u.trim().is_empty());
        Ok(url)
    }
}
