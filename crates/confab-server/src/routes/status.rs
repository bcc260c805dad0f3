use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

async fn status() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// Configure routes for this module
pub fn routes() -> Router {
    Router::new().route("/status", get(status))
}
