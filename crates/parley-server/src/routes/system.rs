use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::{envelope, Envelope};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Envelope<HealthResponse>> {
    envelope(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn routes() -> Router {
    Router::new().route("/health", get(health))
}
