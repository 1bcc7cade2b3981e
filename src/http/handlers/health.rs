//! Liveness handler.
//! Mission: Answer `GET /health` with a bare liveness signal — no dependency
//! pings, so a slow database or cache never flips the load balancer's view of
//! this process (spec §4.8).

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
