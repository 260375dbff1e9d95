use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use relief_core::traits::CrewLauncher;
use relief_gateway::{router, AppState};
use relief_test_utils::CountingLauncher;

const TOPIC: &str = "Earthquake Disaster Relief";

fn state(launcher: Arc<dyn CrewLauncher>) -> Arc<AppState> {
    Arc::new(AppState::new(launcher, TOPIC))
}

fn form_post(details: &str) -> Request<Body> {
    let body = format!("details={}", encode(details));
    Request::post("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn json_post(details: &str) -> Request<Body> {
    Request::post("/api/runs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "details": details }).to_string()))
        .unwrap()
}

/// Minimal form encoding for the characters these tests use.
fn encode(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' ' => "+".to_string(),
            c if c.is_ascii_alphanumeric() => c.to_string(),
            c => format!("%{:02X}", c as u32),
        })
        .collect()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn get_renders_empty_form() {
    let launcher = Arc::new(CountingLauncher::succeeding("Plan C"));
    let app = router(state(launcher));

    let resp = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("Disaster Relief Assistant"));
    assert!(html.contains("Enter Relief Details"));
    assert!(html.contains("Run Relief Operations"));
    assert!(!html.contains("Results of your disaster relief project:"));
}

#[tokio::test]
async fn blank_details_show_error_and_never_launch() {
    for details in ["", "   ", "\n\t "] {
        let launcher = Arc::new(CountingLauncher::succeeding("Plan C"));
        let launches = launcher.launches();
        let app = router(state(launcher));

        let resp = app.oneshot(form_post(details)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("Please fill all the fields."));
        assert!(!html.contains("Results of your disaster relief project:"));
        assert!(launches.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn submission_runs_once_and_shows_result() {
    let launcher = Arc::new(CountingLauncher::succeeding("Plan C: <send water>"));
    let launches = launcher.launches();
    let app = router(state(launcher));

    let resp = app
        .oneshot(form_post("water shortages in district 4"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("Results of your disaster relief project:"));
    assert!(html.contains("Plan C: &lt;send water&gt;"));

    let launches = launches.lock().unwrap();
    assert_eq!(launches.len(), 1);
    assert_eq!(
        launches[0].as_str(),
        "Disaster Relief Topic: Earthquake Disaster Relief\nDetailed Questions: water shortages in district 4"
    );
}

#[tokio::test]
async fn launcher_failure_is_rendered() {
    let launcher = Arc::new(CountingLauncher::failing("HTTP 401: invalid key"));
    let app = router(state(launcher));

    let resp = app.oneshot(form_post("medical supplies")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let html = body_text(resp).await;
    assert!(html.contains("The relief run failed"));
    assert!(html.contains("HTTP 401: invalid key"));
}

#[tokio::test]
async fn run_in_progress_is_refused() {
    let launcher = Arc::new(CountingLauncher::succeeding("Plan C"));
    let launches = launcher.launches();
    let state = state(launcher);
    let _running = state.run_lock.lock().await;

    let resp = router(state.clone())
        .oneshot(form_post("shelter capacity"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = router(state.clone())
        .oneshot(json_post("shelter capacity"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    assert!(launches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn json_api_runs_and_validates() {
    let launcher = Arc::new(CountingLauncher::succeeding("Plan C"));
    let launches = launcher.launches();
    let state = state(launcher);

    let resp = router(state.clone()).oneshot(json_post("  ")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = router(state.clone())
        .oneshot(json_post("road access"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(body["result"], "Plan C");
    assert_eq!(launches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn json_api_reports_failure() {
    let launcher = Arc::new(CountingLauncher::failing("HTTP 503"));
    let resp = router(state(launcher))
        .oneshot(json_post("road access"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("HTTP 503"));
}

#[tokio::test]
async fn health_and_assets() {
    let launcher = Arc::new(CountingLauncher::succeeding("Plan C"));
    let state = state(launcher);

    let resp = router(state.clone())
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["busy"], false);

    let resp = router(state.clone())
        .oneshot(Request::get("/assets/style.css").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/css");

    let resp = router(state)
        .oneshot(Request::get("/assets/missing.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
