//! HTTP surface of the gateway.
//!
//! Every endpoint is a POST taking a JSON body carrying the project name;
//! mutating and reading endpoints share one bearer-token auth check and one
//! error shape.

pub mod health;
pub mod runs;
pub mod tasks;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use clockwork_core::error::ClockworkError;
use clockwork_scheduler::SchedulerError;

use crate::app::AppState;

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: &'static str,
}

pub type ErrorReply = (StatusCode, Json<ApiError>);

pub fn error_reply(status: StatusCode, err: &ClockworkError) -> ErrorReply {
    (
        status,
        Json(ApiError {
            error: err.to_string(),
            code: err.code(),
        }),
    )
}

/// Map a service failure onto a status code: an unknown id is the caller's
/// problem, everything else is ours.
pub fn map_service_error(e: SchedulerError) -> ErrorReply {
    let SchedulerError::Store(store_err) = e;
    let err = ClockworkError::from(store_err);
    let status = match &err {
        ClockworkError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_reply(status, &err)
}

/// Bearer-token check against the configured master key. No key configured
/// means the gateway is open (local single-user deployments).
pub fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = state.config.gateway.master_key.as_deref() else {
        return true;
    };
    extract_bearer(headers)
        .map(|t| t == expected)
        .unwrap_or(false)
}

pub fn unauthorized() -> ErrorReply {
    error_reply(
        StatusCode::UNAUTHORIZED,
        &ClockworkError::Unauthorized(
            "Set 'Authorization: Bearer <your-token>' header.".to_string(),
        ),
    )
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clockwork_store::StoreError;

    #[test]
    fn unknown_task_maps_to_404_with_code() {
        let e = SchedulerError::Store(StoreError::NotFound { id: "t9".into() });
        let (status, Json(body)) = map_service_error(e);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "TASK_NOT_FOUND");
        assert!(body.error.contains("t9"));
    }

    #[test]
    fn store_failures_map_to_500() {
        let e = SchedulerError::Store(StoreError::Database(rusqlite::Error::InvalidQuery));
        let (status, Json(body)) = map_service_error(e);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "DATABASE_ERROR");
    }

    #[test]
    fn unauthorized_body_carries_its_code() {
        let (status, Json(body)) = unauthorized();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "UNAUTHORIZED");
    }

    #[test]
    fn bearer_extraction_requires_the_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer sekrit".parse().unwrap(),
        );
        assert_eq!(extract_bearer(&headers), Some("sekrit"));

        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "sekrit".parse().unwrap());
        assert_eq!(extract_bearer(&headers), None);
    }
}
