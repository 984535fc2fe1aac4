use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use clockwork_core::config::ClockworkConfig;
use clockwork_scheduler::TaskService;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ClockworkConfig,
    pub service: Arc<TaskService>,
}

impl AppState {
    pub fn new(config: ClockworkConfig, service: Arc<TaskService>) -> Self {
        Self { config, service }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/scheduled-task/create", post(crate::http::tasks::create))
        .route("/scheduled-task/list", post(crate::http::tasks::list))
        .route("/scheduled-task/update", post(crate::http::tasks::update))
        .route("/scheduled-task/delete", post(crate::http::tasks::delete))
        .route("/scheduled-task/get_logs", post(crate::http::tasks::get_logs))
        .route("/scheduled-task/trigger", post(crate::http::runs::trigger))
        .route("/scheduled-task/test", post(crate::http::runs::test))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
