use anyhow::{Context, Result};
use cctv_proxy::{
    api::create_router, AppState, CameraDirectory, HttpUpstreamClient, InMemoryCameraDirectory,
    PgCameraDirectory, ProxyConfig, StreamRelay,
};
use common::{JwtSessionVerifier, SessionVerifier};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _logging = telemetry::init_with_service("cctv-proxy");

    let config = ProxyConfig::from_env()?;

    let cameras: Arc<dyn CameraDirectory> = if let Some(database_url) = &config.database_url {
        info!("using postgres camera directory");
        Arc::new(PgCameraDirectory::connect(database_url).await?)
    } else if let Some(path) = &config.cameras_file {
        let directory = InMemoryCameraDirectory::load_json_file(path).await?;
        info!(path = %path.display(), cameras = directory.len().await, "loaded camera file");
        Arc::new(directory)
    } else {
        warn!("neither DATABASE_URL nor CAMERAS_FILE is set; every camera will report not configured");
        Arc::new(InMemoryCameraDirectory::new())
    };

    let upstream = Arc::new(HttpUpstreamClient::new(config.upstream_connect_timeout)?);
    let relay = StreamRelay::new(cameras, upstream, &config.upstream_user_agent)?;

    let sessions: Arc<dyn SessionVerifier> = Arc::new(
        JwtSessionVerifier::new(config.session_secret.clone())
            .with_cookie_name(config.session_cookie.clone()),
    );

    let state = AppState::new(relay, sessions, config.public_base_url.clone());
    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, public_base_url = %config.public_base_url, "cctv-proxy listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
