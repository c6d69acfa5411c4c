//! `GET /api/hello`: a trivial JSON health check.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HelloResponse {
    pub status: &'static str,
    pub service: &'static str,
}

pub async fn hello_handler() -> Json<HelloResponse> {
    Json(HelloResponse { status: "ok", service: "rain-api" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hello_reports_ok() {
        let response = hello_handler().await;
        assert_eq!(response.status, "ok");
    }
}
