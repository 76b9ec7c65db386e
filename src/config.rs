//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files, applies environment
//! overrides for the values the site shares with its deployment platform, and
//! defines constants for HTTP cache headers, deployment check timeouts, banner
//! cache settings, logging, and default paths. `AppConfig` is the root
//! configuration struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// HTTP Response Cache Control
// =============================================================================
// Health and deployment status responses must never be served from a cache:
// both are used to observe the live state of a deployment.

pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

// =============================================================================
// API Paths
// =============================================================================

/// Liveness and identity endpoint
pub const HEALTH_PATH: &str = "/api/health";

/// Deployment verification endpoint
pub const DEPLOYMENT_STATUS_PATH: &str = "/api/deployment-status";

// =============================================================================
// Deployment Check Constants
// =============================================================================

/// Upstream health check timeout in seconds
pub const DEPLOYMENT_TIMEOUT_SECS: u64 = 10;

/// Maximum redirects followed when calling the production health endpoint
pub const DEPLOYMENT_MAX_REDIRECTS: usize = 10;

pub const DEPLOYMENT_CHECK_AGENT: &str = "DeploymentStatusCheck";
pub const DEPLOYMENT_CHECK_AGENT_VERSION: &str = "1.0";

/// User-Agent sent with upstream health checks
pub const DEPLOYMENT_USER_AGENT: &str =
    formatcp!("{}/{}", DEPLOYMENT_CHECK_AGENT, DEPLOYMENT_CHECK_AGENT_VERSION);

/// Host fragments that mark a site URL as pointing at the local machine
pub const LOCALHOST_PATTERNS: [&str; 3] = ["localhost", "127.0.0.1", "0.0.0.0"];

/// Seconds to wait for open connections to drain on shutdown
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

// =============================================================================
// Deploy Banner Constants
// =============================================================================

/// Storage key for the cached deployment status
pub const BANNER_STORAGE_KEY: &str = "deploy-banner-status";

/// Client-side timeout for the deployment status request in milliseconds
pub const BANNER_FETCH_TIMEOUT_MS: u64 = 5000;

/// Cached status lifetime in seconds (1 hour)
pub const BANNER_CACHE_TTL_SECS: u64 = 3600;

/// Route of the deploy guide; also the default prefix the banner is hidden under
pub const BANNER_GUIDE_PATH: &str = "/deploy";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default directory for the banner's persisted state
pub const DEFAULT_STATE_DIR: &str = ".ordo";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "ordo_site=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Default status endpoint the banner talks to during local development
pub const DEFAULT_BANNER_STATUS_URL: &str =
    formatcp!("http://127.0.0.1:3000{}", DEPLOYMENT_STATUS_PATH);

// =============================================================================
// Environment Overrides
// =============================================================================

pub const ENV_SITE_URL: &str = "SITE_URL";
pub const ENV_APP_ID: &str = "APP_ID";
pub const ENV_APP_ENV: &str = "APP_ENV";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Site identity and build mode
    #[serde(default)]
    pub site: SiteConfig,
    /// Upstream deployment check settings
    #[serde(default)]
    pub deployment: DeploymentConfig,
    /// Development banner settings
    #[serde(default)]
    pub banner: BannerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: TlsConfig,
}

/// TLS mode for the HTTP server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain HTTP (local development or behind a reverse proxy)
    #[default]
    None,
    /// User-provided certificate and key files
    Manual,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub mode: TlsMode,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Build mode of the running site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" => Some(Environment::Development),
            "test" => Some(Environment::Test),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteConfig {
    /// Public base URL of the production deployment
    pub url: Option<String>,
    /// Identity token shared by every deployment of this application
    pub app_id: Option<String>,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    /// Timeout for the production health check in seconds (default: 10)
    #[serde(default = "DeploymentConfig::default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: Self::default_timeout(),
        }
    }
}

impl DeploymentConfig {
    fn default_timeout() -> u64 {
        DEPLOYMENT_TIMEOUT_SECS
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerConfig {
    /// Deployment status endpoint queried by the banner
    #[serde(default = "BannerConfig::default_status_url")]
    pub status_url: String,
    /// Client-side request timeout in milliseconds (default: 5000)
    #[serde(default = "BannerConfig::default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
    /// Lifetime of the cached status in seconds (default: 1 hour)
    #[serde(default = "BannerConfig::default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Route of the deploy guide the banner links to
    #[serde(default = "BannerConfig::default_guide_path")]
    pub guide_path: String,
    /// Route prefixes under which the banner is never shown
    #[serde(default = "BannerConfig::default_hidden_prefixes")]
    pub hidden_path_prefixes: Vec<String>,
    /// Directory holding the persisted banner state
    #[serde(default = "BannerConfig::default_state_dir")]
    pub state_dir: String,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            status_url: Self::default_status_url(),
            fetch_timeout_ms: Self::default_fetch_timeout(),
            cache_ttl_seconds: Self::default_cache_ttl(),
            guide_path: Self::default_guide_path(),
            hidden_path_prefixes: Self::default_hidden_prefixes(),
            state_dir: Self::default_state_dir(),
        }
    }
}

impl BannerConfig {
    fn default_status_url() -> String {
        DEFAULT_BANNER_STATUS_URL.to_string()
    }
    fn default_fetch_timeout() -> u64 {
        BANNER_FETCH_TIMEOUT_MS
    }
    fn default_cache_ttl() -> u64 {
        BANNER_CACHE_TTL_SECS
    }
    fn default_guide_path() -> String {
        BANNER_GUIDE_PATH.to_string()
    }
    fn default_hidden_prefixes() -> Vec<String> {
        vec![BANNER_GUIDE_PATH.to_string()]
    }
    fn default_state_dir() -> String {
        DEFAULT_STATE_DIR.to_string()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and apply process environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without consulting the environment.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.site.url = non_empty(config.site.url.take());
        config.site.app_id = non_empty(config.site.app_id.take());
        Ok(config)
    }

    /// Override site values from environment-style lookups. Empty values count as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(lookup(ENV_SITE_URL)) {
            self.site.url = Some(url);
        }
        if let Some(app_id) = non_empty(lookup(ENV_APP_ID)) {
            self.site.app_id = Some(app_id);
        }
        if let Some(env) = non_empty(lookup(ENV_APP_ENV)) {
            self.site.environment = Environment::parse(&env).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "{} must be development, test or production (got '{}')",
                    ENV_APP_ENV, env
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.tls.mode == TlsMode::Manual
            && (self.http.tls.cert_path.is_none() || self.http.tls.key_path.is_none())
        {
            return Err(ConfigError::Validation(
                "http.tls.mode = \"manual\" requires cert_path and key_path".to_string(),
            ));
        }

        if self.deployment.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "deployment.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if self.banner.fetch_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "banner.fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\" (got '{}')",
                self.logging.format
            )));
        }

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const MINIMAL: &str = r#"
[http]
host = "127.0.0.1"
port = 3000
"#;

    #[test]
    fn test_defaults_for_minimal_config() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.site.url, None);
        assert_eq!(config.site.app_id, None);
        assert_eq!(config.site.environment, Environment::Development);
        assert_eq!(config.deployment.timeout(), Duration::from_secs(10));
        assert_eq!(config.banner.fetch_timeout(), Duration::from_millis(5000));
        assert_eq!(config.banner.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.banner.hidden_path_prefixes, vec!["/deploy".to_string()]);
        assert_eq!(config.banner.guide_path, "/deploy");
        assert_eq!(config.http.tls.mode, TlsMode::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_user_agent_is_composed() {
        assert_eq!(DEPLOYMENT_USER_AGENT, "DeploymentStatusCheck/1.0");
        assert_eq!(
            DEFAULT_BANNER_STATUS_URL,
            "http://127.0.0.1:3000/api/deployment-status"
        );
    }

    #[test]
    fn test_empty_site_values_are_unset() {
        let toml = format!("{}\n[site]\nurl = \"\"\napp_id = \"  \"\n", MINIMAL);
        let config = AppConfig::from_toml(&toml).unwrap();
        assert_eq!(config.site.url, None);
        assert_eq!(config.site.app_id, None);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let toml = format!(
            "{}\n[site]\nurl = \"https://file.example.com\"\napp_id = \"file-id\"\n",
            MINIMAL
        );
        let mut config = AppConfig::from_toml(&toml).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SITE_URL, "https://env.example.com"),
            (ENV_APP_ID, ""),
            (ENV_APP_ENV, "Production"),
        ]);
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.site.url.as_deref(), Some("https://env.example.com"));
        // Empty override leaves the file value in place
        assert_eq!(config.site.app_id.as_deref(), Some("file-id"));
        assert_eq!(config.site.environment, Environment::Production);
    }

    #[test]
    fn test_invalid_environment_override() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        let result = config.apply_overrides(|name| {
            (name == ENV_APP_ENV).then(|| "staging".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_manual_tls_requires_paths() {
        let toml = r#"
[http]
host = "0.0.0.0"
port = 443

[http.tls]
mode = "manual"
cert_path = "/etc/ordo/cert.pem"
"#;
        let config = AppConfig::from_toml(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let toml = format!("{}\n[logging]\nformat = \"xml\"\n", MINIMAL);
        let config = AppConfig::from_toml(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let toml = format!("{}\n[deployment]\ntimeout_seconds = 0\n", MINIMAL);
        let config = AppConfig::from_toml(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}\n[banner]\nhidden_path_prefixes = [\"/deploy\", \"/launch\"]\n",
            MINIMAL
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.banner.hidden_path_prefixes.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/ordo.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
