//! Execution endpoints: manual triggers and dry-runs.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use clockwork_core::types::{Parameter, TaskId};
use clockwork_scheduler::Environment;

use crate::app::AppState;
use crate::http::{check_auth, map_service_error, unauthorized, ErrorReply};

#[derive(Deserialize)]
pub struct TriggerRequest {
    pub project: String,
    pub id: TaskId,
}

/// POST /scheduled-task/trigger — run a task now, outside its schedule.
/// Replies immediately; the execution settles in the background.
pub async fn trigger(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TriggerRequest>,
) -> Result<Json<Value>, ErrorReply> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let outcome = state
        .service
        .trigger(&req.project, &req.id)
        .map_err(map_service_error)?;
    Ok(Json(json!({ "message": outcome.message() })))
}

#[derive(Deserialize)]
pub struct TestRequest {
    pub project: String,
    pub script: String,
    #[serde(default)]
    pub parameters: HashMap<String, Parameter>,
}

/// POST /scheduled-task/test — dry-run a script against in-memory
/// collaborators and return everything it produced. Blocks until the run
/// finishes or hits its deadline.
pub async fn test(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TestRequest>,
) -> Result<Json<Environment>, ErrorReply> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let environment = state
        .service
        .test(&req.project, &req.script, &req.parameters)
        .await;
    Ok(Json(environment))
}
