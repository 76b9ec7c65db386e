//! Deployment status endpoint.

use axum::{extract::State, Json};

use crate::deployment::DeploymentStatus;
use crate::state::AppState;

/// Report whether production is live and runs this application.
///
/// Answers 200 for every outcome; failures are described in `reason`.
pub async fn status(State(state): State<AppState>) -> Json<DeploymentStatus> {
    let status = state.checker.check().await;
    tracing::info!(deployed = status.deployed, reason = %status.reason, "Deployment status");
    Json(status)
}
