use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Form, Json};
use serde::Deserialize;
use tracing::{error, info, warn};

use relief_core::plan::{InputBundle, WEB_TOPIC_LABEL};

use crate::page::{self, Outcome, BLANK_INPUT_MESSAGE, BUSY_MESSAGE};
use crate::state::AppState;

/// Result of one attempt to start a run.
enum Attempt {
    Blank,
    Busy,
    Done(String),
    Failed(String),
}

/// Validate, take the single-flight lock, and run the crew once.
async fn attempt_run(state: &AppState, details: &str) -> Attempt {
    if details.trim().is_empty() {
        info!("Rejected run with blank details");
        return Attempt::Blank;
    }

    let Ok(_guard) = state.run_lock.try_lock() else {
        warn!("Run requested while another is in progress");
        return Attempt::Busy;
    };

    let bundle = InputBundle::compose(WEB_TOPIC_LABEL, &state.topic, details);
    info!(details_chars = details.chars().count(), "Starting relief run");

    match state.launcher.launch(bundle).await {
        Ok(result) => Attempt::Done(result),
        Err(e) => {
            error!(error = %e, "Relief run failed");
            Attempt::Failed(e.to_string())
        }
    }
}

// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "busy": state.run_lock.try_lock().is_err(),
    }))
}

// GET /
pub async fn show_form(State(state): State<Arc<AppState>>) -> Response {
    page::respond(StatusCode::OK, &state.topic, "", &Outcome::Empty)
}

#[derive(Deserialize)]
pub struct RunForm {
    #[serde(default)]
    pub details: String,
}

// POST /
pub async fn submit_form(State(state): State<Arc<AppState>>, Form(form): Form<RunForm>) -> Response {
    let (status, outcome) = match attempt_run(&state, &form.details).await {
        Attempt::Blank => (StatusCode::OK, Outcome::Error(BLANK_INPUT_MESSAGE.into())),
        Attempt::Busy => (StatusCode::CONFLICT, Outcome::Busy),
        Attempt::Done(result) => (StatusCode::OK, Outcome::Results(result)),
        Attempt::Failed(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Outcome::Error(format!("The relief run failed: {}", e)),
        ),
    };
    page::respond(status, &state.topic, &form.details, &outcome)
}

#[derive(Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub details: String,
}

// POST /api/runs
pub async fn api_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match attempt_run(&state, &body.details).await {
        Attempt::Blank => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": BLANK_INPUT_MESSAGE })),
        ),
        Attempt::Busy => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": BUSY_MESSAGE })),
        ),
        Attempt::Done(result) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "result": result,
                "finished_at": chrono::Utc::now().to_rfc3339(),
            })),
        ),
        Attempt::Failed(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e })),
        ),
    }
}
