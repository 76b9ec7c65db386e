use crate::config::ConfigError;
use crate::http::ServerError;

/// Top-level application error for startup and CLI commands.
///
/// Request handlers never produce it: the health and deployment status
/// endpoints always answer with a well-formed body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template rendering error: {0}")]
    Template(#[from] tera::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
