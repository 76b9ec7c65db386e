//! Where the banner gets its deployment status from.

use async_trait::async_trait;
use http::header::ACCEPT;

use crate::deployment::DeploymentStatus;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A source of definitive deployment status responses.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<DeploymentStatus, FetchError>;
}

/// Queries the site's deployment status endpoint over HTTP.
#[derive(Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch_status(&self) -> Result<DeploymentStatus, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(response.json::<DeploymentStatus>().await?)
    }
}
