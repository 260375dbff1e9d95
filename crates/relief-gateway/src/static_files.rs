use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "ui/"]
struct UiAssets;

/// The page template, with `{{...}}` placeholders.
pub fn page_template() -> Option<String> {
    UiAssets::get("index.html").map(|content| String::from_utf8_lossy(&content.data).into_owned())
}

pub async fn static_file(Path(path): Path<String>) -> impl IntoResponse {
    match UiAssets::get(&format!("assets/{path}")) {
        Some(content) => {
            let mime = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime)],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
