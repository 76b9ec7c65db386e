//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::deployment::DeploymentChecker;

/// Shared application state, cloneable across handlers.
///
/// Contains the immutable application configuration and the deployment
/// checker used by the status endpoint.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub checker: DeploymentChecker,
}

impl AppState {
    /// Creates a new application state from the given configuration and checker.
    pub fn new(config: AppConfig, checker: DeploymentChecker) -> Self {
        Self {
            config: Arc::new(config),
            checker,
        }
    }
}
