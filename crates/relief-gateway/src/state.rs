use std::sync::Arc;

use relief_core::traits::CrewLauncher;

/// Shared application state for axum handlers.
pub struct AppState {
    pub launcher: Arc<dyn CrewLauncher>,
    /// Topic embedded in every bundle built from the form.
    pub topic: String,
    /// Held for the duration of a run; a second run is refused, not queued.
    pub run_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    pub fn new(launcher: Arc<dyn CrewLauncher>, topic: impl Into<String>) -> Self {
        Self {
            launcher,
            topic: topic.into(),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }
}
