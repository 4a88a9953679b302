use axum::extract::FromRef;
use common::SessionVerifier;
use std::sync::Arc;

use crate::relay::StreamRelay;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<StreamRelay>,
    pub sessions: Arc<dyn SessionVerifier>,
    /// Fallback public origin for rewritten playlist URLs
    pub public_base_url: String,
}

impl AppState {
    pub fn new(
        relay: StreamRelay,
        sessions: Arc<dyn SessionVerifier>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            relay: Arc::new(relay),
            sessions,
            public_base_url: public_base_url.into(),
        }
    }
}

impl FromRef<AppState> for Arc<dyn SessionVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
