use axum::Json;
use serde_json::{Value, json};

/// Liveness only; collection failures show up in `tf_up` instead.
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
