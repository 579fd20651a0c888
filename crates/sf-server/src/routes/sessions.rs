//! Inspection and teardown of running encoder sessions.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use sf_stream::ManagedSessionInfo;

use crate::context::AppContext;

/// GET /api/sessions
pub async fn list_sessions(State(ctx): State<AppContext>) -> Json<Vec<ManagedSessionInfo>> {
    Json(ctx.sessions.list())
}

/// DELETE /api/sessions
pub async fn destroy_sessions(State(ctx): State<AppContext>) -> Json<Value> {
    let destroyed = ctx.sessions.shutdown().await;
    Json(json!({ "destroyed": destroyed }))
}
