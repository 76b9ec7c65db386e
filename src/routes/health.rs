//! Health check endpoint for uptime monitors and deployment verification.
//!
//! Reports liveness together with the configured application identity, which
//! the deployment status check compares against its own.

use axum::{extract::State, Json};

use crate::deployment::HealthReport;
use crate::state::AppState;

/// Health check handler.
///
/// Always succeeds with a freshly stamped report.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport::now(state.config.site.app_id.as_deref()))
}
