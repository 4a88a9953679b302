use anyhow::{Context, Result};
use common::session::DEFAULT_SESSION_COOKIE;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "NaviSight-CCTV-Proxy/",
    env!("CARGO_PKG_VERSION"),
    " (+https://navisight.example)"
);

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub bind_addr: String,
    /// Used for rewritten playlist URLs when the request carries no host
    pub public_base_url: String,
    pub session_secret: String,
    pub session_cookie: String,
    pub database_url: Option<String>,
    pub cameras_file: Option<PathBuf>,
    pub upstream_user_agent: String,
    pub upstream_connect_timeout: Duration,
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env::var("CCTV_PROXY_ADDR").unwrap_or_else(|_| "127.0.0.1:8092".to_string());

        let connect_timeout_secs = match optional_var("UPSTREAM_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("UPSTREAM_CONNECT_TIMEOUT_SECS must be a number of seconds")?,
            None => 10,
        };

        Ok(Self {
            public_base_url: optional_var("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://{}", bind_addr)),
            bind_addr,
            session_secret: optional_var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            session_cookie: optional_var("SESSION_COOKIE")
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            database_url: optional_var("DATABASE_URL"),
            cameras_file: optional_var("CAMERAS_FILE").map(PathBuf::from),
            upstream_user_agent: optional_var("UPSTREAM_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            upstream_connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }
}
