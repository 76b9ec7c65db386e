//! Production health check.
//!
//! The check is an ordered chain: configuration is validated first, then the
//! production health endpoint is requested once with a bounded timeout and its
//! identity token compared to ours. The first failing step decides the reason.

use std::time::Duration;

use http::header::{ACCEPT, CACHE_CONTROL, USER_AGENT};
use serde_json::Value;
use tracing::instrument;

use super::DeploymentStatus;
use crate::config::{
    AppConfig, DEPLOYMENT_MAX_REDIRECTS, DEPLOYMENT_USER_AGENT, ENV_APP_ID, ENV_SITE_URL,
    HEALTH_PATH, LOCALHOST_PATTERNS,
};

/// Values the checker needs from the process configuration.
#[derive(Debug, Clone)]
pub struct CheckerSettings {
    pub site_url: Option<String>,
    pub app_id: Option<String>,
    pub timeout: Duration,
}

impl From<&AppConfig> for CheckerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            site_url: config.site.url.clone(),
            app_id: config.site.app_id.clone(),
            timeout: config.deployment.timeout(),
        }
    }
}

/// Verifies that the configured production URL serves this application.
///
/// Cloning is cheap: the underlying `reqwest::Client` is reference counted.
#[derive(Clone)]
pub struct DeploymentChecker {
    client: reqwest::Client,
    settings: CheckerSettings,
}

impl DeploymentChecker {
    /// Create a checker with its own HTTP client.
    pub fn new(settings: CheckerSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(DEPLOYMENT_MAX_REDIRECTS))
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Create a checker around an existing client (custom resolvers, proxies).
    ///
    /// Identification and cache headers are set per request, so any client works.
    pub fn with_client(client: reqwest::Client, settings: CheckerSettings) -> Self {
        Self { client, settings }
    }

    /// Run the check. Never fails; every outcome is a `DeploymentStatus`.
    #[instrument(name = "deployment::check", skip(self))]
    pub async fn check(&self) -> DeploymentStatus {
        let status = self.run().await;
        tracing::debug!(deployed = status.deployed, reason = %status.reason, "Deployment check finished");
        status
    }

    async fn run(&self) -> DeploymentStatus {
        let Some(site_url) = self.settings.site_url.as_deref() else {
            return DeploymentStatus::not_deployed(format!("{} not configured", ENV_SITE_URL));
        };

        if is_localhost(site_url) {
            return DeploymentStatus::not_deployed(format!("{} points to localhost", ENV_SITE_URL));
        }

        let Some(local_app_id) = self.settings.app_id.as_deref() else {
            return DeploymentStatus::not_deployed(format!(
                "{} not configured (run launch wizard first)",
                ENV_APP_ID
            ));
        };

        let health_url = build_health_url(site_url);
        tracing::debug!(url = %health_url, "Requesting production health endpoint");

        let response = match self
            .client
            .get(&health_url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .header(USER_AGENT, DEPLOYMENT_USER_AGENT)
            .timeout(self.settings.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        let status_code = response.status();
        if !status_code.is_success() {
            return DeploymentStatus::not_deployed(format!(
                "Production health check returned {}",
                status_code.as_u16()
            ));
        }

        // The request timeout also covers reading the body
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return transport_failure(&e),
        };

        let health: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => {
                return DeploymentStatus::not_deployed(
                    "Production health endpoint returned invalid JSON",
                )
            }
        };

        verify_identity(&health, local_app_id)
    }
}

/// Compare the `appId` a health response reports with ours.
///
/// Absent and falsy values (`null`, `false`, `0`, `""`) are reported as
/// missing; any other value that is not our identity string is a mismatch.
fn verify_identity(health: &Value, local_app_id: &str) -> DeploymentStatus {
    match health.get("appId") {
        None => missing_app_id(),
        Some(remote) if is_falsy(remote) => missing_app_id(),
        Some(Value::String(remote)) if remote == local_app_id => {
            DeploymentStatus::deployed("Production deployed and verified")
        }
        Some(_) => DeploymentStatus::not_deployed(format!(
            "{} mismatch: different app at production URL",
            ENV_APP_ID
        )),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn missing_app_id() -> DeploymentStatus {
    DeploymentStatus::not_deployed(format!("Production missing {} in health response", ENV_APP_ID))
}

fn transport_failure(error: &reqwest::Error) -> DeploymentStatus {
    if error.is_timeout() {
        tracing::warn!("Production health check timed out");
        DeploymentStatus::not_deployed("Production health check timed out")
    } else {
        tracing::warn!(error = %error, "Production health check failed");
        DeploymentStatus::not_deployed(format!("Cannot reach production: {}", error))
    }
}

/// Whether a site URL points at the local machine.
///
/// Matches the URL's host against [`LOCALHOST_PATTERNS`] case-insensitively.
/// Unparsable URLs are matched as a whole.
pub fn is_localhost(url: &str) -> bool {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| url.to_ascii_lowercase());

    LOCALHOST_PATTERNS.iter().any(|pattern| host.contains(pattern))
}

/// Health endpoint URL for a site base URL, with trailing slashes collapsed.
pub fn build_health_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH)
}
