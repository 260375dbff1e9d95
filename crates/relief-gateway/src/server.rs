use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use relief_core::config::GatewayConfig;
use relief_core::traits::CrewLauncher;

use crate::routes;
use crate::state::AppState;
use crate::static_files;

/// Routes of the relief web form and JSON API.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/runs", post(routes::api_run))
        .route("/", get(routes::show_form).post(routes::submit_form))
        .route("/assets/{*path}", get(static_files::static_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server for the relief form, built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    launcher: Arc<dyn CrewLauncher>,
    topic: String,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, launcher: Arc<dyn CrewLauncher>, topic: impl Into<String>) -> Self {
        Self {
            config,
            launcher,
            topic: topic.into(),
        }
    }

    /// Run the server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState::new(self.launcher.clone(), self.topic.clone()));
        let app = router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Relief form listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
