//! `GET /` (directory listing of produced PNGs) and `GET /<filename>`
//! (PNG bytes), served straight off `directories.outputs_web` (§6).

use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use crate::state::AppState;

/// `GET /`: a minimal HTML index of every `.png` file currently present,
/// newest first.
pub async fn list_pngs(State(state): State<Arc<AppState>>) -> Html<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(&state.outputs_web)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.ends_with(".png"))
        .collect();
    names.sort_unstable_by(|a, b| b.cmp(a));

    let items: String = names.iter().map(|name| format!("<li><a href=\"/{name}\">{name}</a></li>")).collect();
    Html(format!("<html><body><ul>{items}</ul></body></html>"))
}

/// A bare filename with no path separators or `..` segments, rejecting
/// anything that could escape `outputs_web`.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && name != ".." && name != "."
}

/// `GET /<filename>`: raw PNG bytes, or a 404 if the file doesn't exist
/// or the name escapes the output directory.
pub async fn serve_png(State(state): State<Arc<AppState>>, AxumPath(filename): AxumPath<String>) -> Response {
    if !is_safe_filename(&filename) {
        return (StatusCode::NOT_FOUND, Html("<h1>404 Not Found</h1>".to_string())).into_response();
    }

    let path = state.outputs_web.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Html("<h1>404 Not Found</h1>".to_string())).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal_filenames() {
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("sub/dir.png"));
        assert!(!is_safe_filename(".."));
        assert!(!is_safe_filename(""));
    }

    #[test]
    fn accepts_plain_filenames() {
        assert!(is_safe_filename("2024-06-01_1200.png"));
    }
}
