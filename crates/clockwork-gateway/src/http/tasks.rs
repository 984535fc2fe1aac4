//! Task management endpoints under /scheduled-task.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use clockwork_core::types::{LogEntry, Parameter, Task, TaskId};

use crate::app::AppState;
use crate::http::{check_auth, map_service_error, unauthorized, ErrorReply};

#[derive(Deserialize)]
pub struct CreateRequest {
    pub project: String,
    pub name: String,
    pub script: String,
    #[serde(default)]
    pub parameters: HashMap<String, Parameter>,
    #[serde(default)]
    pub image: Option<String>,
    /// Seconds between scheduled runs.
    pub interval: u64,
}

/// POST /scheduled-task/create — persist a new task; the id is assigned
/// here and returned with the full task.
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest>,
) -> Result<Json<Task>, ErrorReply> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }

    let task = Task {
        id: TaskId::new(),
        project: req.project,
        name: req.name,
        script: req.script,
        parameters: req.parameters,
        image: req.image,
        interval_secs: req.interval,
        last_executed_at: None,
    };
    state.service.create(&task).map_err(map_service_error)?;
    Ok(Json(task))
}

#[derive(Deserialize)]
pub struct ProjectRequest {
    pub project: String,
}

/// POST /scheduled-task/list — all tasks of a project.
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ProjectRequest>,
) -> Result<Json<Vec<Task>>, ErrorReply> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let tasks = state.service.list(&req.project).map_err(map_service_error)?;
    Ok(Json(tasks))
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub project: String,
    pub task: Task,
}

/// POST /scheduled-task/update — rewrite script, parameters and interval.
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Value>, ErrorReply> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state
        .service
        .update(&req.project, &req.task)
        .map_err(map_service_error)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct TaskRequest {
    pub project: String,
    pub id: TaskId,
}

/// POST /scheduled-task/delete — permanently remove a task.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TaskRequest>,
) -> Result<Json<Value>, ErrorReply> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state
        .service
        .delete(&req.project, &req.id)
        .map_err(map_service_error)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct LogsRequest {
    pub project: String,
    pub id: TaskId,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// POST /scheduled-task/get_logs — the task's log stream, oldest first.
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LogsRequest>,
) -> Result<Json<Vec<LogEntry>>, ErrorReply> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let entries = state
        .service
        .log_entries(&req.project, &req.id, req.start, req.end)
        .map_err(map_service_error)?;
    Ok(Json(entries))
}
