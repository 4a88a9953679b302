use crate::engine::HlsEngine;

/// Owns the HLS engine for one mounted stream.
///
/// `dispose` may be called any number of times; the engine is destroyed once.
/// Dropping the session disposes it.
pub struct PlayerSession {
    engine: Option<Box<dyn HlsEngine>>,
}

impl PlayerSession {
    pub fn new(engine: Box<dyn HlsEngine>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    pub fn engine_mut(&mut self) -> Option<&mut (dyn HlsEngine + 'static)> {
        self.engine.as_deref_mut()
    }

    pub fn is_disposed(&self) -> bool {
        self.engine.is_none()
    }

    pub fn dispose(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.dispose();
    }
}
