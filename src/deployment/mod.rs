//! Deployment verification.
//!
//! Decides whether the production deployment at the configured site URL is
//! live and runs this same application, by calling its health endpoint and
//! comparing identity tokens. Every failure is folded into a
//! [`DeploymentStatus`] with a diagnostic reason; nothing here returns an error
//! to the caller.

mod checker;

pub use checker::{build_health_url, is_localhost, CheckerSettings, DeploymentChecker};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Liveness report served by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub app_id: Option<String>,
}

impl HealthReport {
    /// Build a report stamped with the current UTC time.
    pub fn now(app_id: Option<&str>) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            app_id: app_id.map(str::to_string),
        }
    }
}

/// Outcome of a deployment check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub deployed: bool,
    #[serde(default)]
    pub reason: String,
}

impl DeploymentStatus {
    pub fn deployed(reason: impl Into<String>) -> Self {
        Self {
            deployed: true,
            reason: reason.into(),
        }
    }

    pub fn not_deployed(reason: impl Into<String>) -> Self {
        Self {
            deployed: false,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_report_serializes_camel_case() {
        let report = HealthReport::now(Some("ordo-123"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["appId"], "ordo-123");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_health_report_null_app_id() {
        let json = serde_json::to_value(HealthReport::now(None)).unwrap();
        assert!(json["appId"].is_null());
    }

    #[test]
    fn test_timestamp_is_iso8601() {
        let report = HealthReport::now(None);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }

    #[test]
    fn test_status_reason_defaults_when_absent() {
        let status: DeploymentStatus = serde_json::from_str(r#"{"deployed":true}"#).unwrap();
        assert_eq!(status, DeploymentStatus::deployed(""));
    }
}
