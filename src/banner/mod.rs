//! Development-only deploy banner.
//!
//! The banner points developers at the deploy guide until the production
//! deployment is confirmed to run this application. It is hidden when:
//! - the site is not a development build
//! - the current route is under an excluded prefix (the guide itself)
//! - the deployment has been confirmed, either from the local cache or by a
//!   background check started on mount
//!
//! Once confirmed the banner stays hidden for its lifetime. Check failures
//! leave it visible and are never cached, so the next mount retries.

mod cache;
mod source;

pub use cache::{CachedStatus, FileStore, MemoryStore, StatusCache, StatusStore, StoreError};
pub use source::{FetchError, HttpStatusSource, StatusSource};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tera::Tera;
use tokio::task::JoinHandle;

use crate::config::{AppConfig, Environment};
use crate::deployment::DeploymentStatus;
use crate::templates::BANNER_TEMPLATE;

/// Banner behaviour derived from configuration.
#[derive(Debug, Clone)]
pub struct BannerSettings {
    pub environment: Environment,
    /// Link target of the banner
    pub guide_path: String,
    pub hidden_path_prefixes: Vec<String>,
    pub fetch_timeout: Duration,
}

impl From<&AppConfig> for BannerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            environment: config.site.environment,
            guide_path: config.banner.guide_path.clone(),
            hidden_path_prefixes: config.banner.hidden_path_prefixes.clone(),
            fetch_timeout: config.banner.fetch_timeout(),
        }
    }
}

/// How a background check ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Not a development build; no check was started
    Skipped,
    /// The cache already confirmed the deployment; no request was made
    CachedDeployed,
    /// The status endpoint answered (and the answer was cached)
    Checked(DeploymentStatus),
    /// The request failed before producing a status
    Failed(String),
    /// The client-side timeout elapsed
    TimedOut,
}

struct BannerInner {
    settings: BannerSettings,
    cache: StatusCache,
    source: Arc<dyn StatusSource>,
    deployed: AtomicBool,
}

#[derive(Clone)]
pub struct DeployBanner {
    inner: Arc<BannerInner>,
}

impl DeployBanner {
    /// Create a banner whose initial state comes from the cache, so a confirmed
    /// deployment never flashes the banner before the background check runs.
    pub fn new(settings: BannerSettings, cache: StatusCache, source: Arc<dyn StatusSource>) -> Self {
        let deployed = cache.read().map(|c| c.deployed).unwrap_or(false);
        Self {
            inner: Arc::new(BannerInner {
                settings,
                cache,
                source,
                deployed: AtomicBool::new(deployed),
            }),
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.inner.deployed.load(Ordering::Acquire)
    }

    pub fn is_hidden_for_path(&self, path: Option<&str>) -> bool {
        let Some(path) = path else {
            return false;
        };
        self.inner
            .settings
            .hidden_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_visible(&self, path: Option<&str>) -> bool {
        self.inner.settings.environment.is_development()
            && !self.is_hidden_for_path(path)
            && !self.is_deployed()
    }

    /// Render the banner markup, or `None` when it should not be shown.
    pub fn render(&self, tera: &Tera, path: Option<&str>) -> Result<Option<String>, tera::Error> {
        if !self.is_visible(path) {
            return Ok(None);
        }

        let mut context = tera::Context::new();
        context.insert("guide_href", &self.inner.settings.guide_path);
        tera.render(BANNER_TEMPLATE, &context).map(Some)
    }

    /// Start the background check. The check is cancelled when the returned
    /// handle is unmounted or dropped.
    #[must_use = "dropping the handle aborts the background check"]
    pub fn mount(&self) -> MountedBanner {
        if !self.inner.settings.environment.is_development() {
            return MountedBanner { task: None };
        }

        let inner = Arc::clone(&self.inner);
        MountedBanner {
            task: Some(tokio::spawn(run_check(inner))),
        }
    }
}

async fn run_check(inner: Arc<BannerInner>) -> CheckOutcome {
    if inner.cache.read().is_some_and(|c| c.deployed) {
        inner.deployed.store(true, Ordering::Release);
        return CheckOutcome::CachedDeployed;
    }

    let fetch = inner.source.fetch_status();
    match tokio::time::timeout(inner.settings.fetch_timeout, fetch).await {
        Ok(Ok(status)) => {
            inner.cache.write(status.deployed);
            if status.deployed {
                inner.deployed.store(true, Ordering::Release);
            }
            tracing::debug!(deployed = status.deployed, reason = %status.reason, "Deployment status received");
            CheckOutcome::Checked(status)
        }
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Deployment status check failed");
            CheckOutcome::Failed(e.to_string())
        }
        Err(_) => {
            tracing::debug!(
                timeout_ms = inner.settings.fetch_timeout.as_millis() as u64,
                "Deployment status check timed out"
            );
            CheckOutcome::TimedOut
        }
    }
}

/// A mounted banner's background check.
#[must_use = "dropping the handle aborts the background check"]
pub struct MountedBanner {
    task: Option<JoinHandle<CheckOutcome>>,
}

impl MountedBanner {
    /// Wait for the check to finish. Returns `None` if it was cancelled.
    pub async fn finished(mut self) -> Option<CheckOutcome> {
        match self.task.take() {
            None => Some(CheckOutcome::Skipped),
            Some(task) => task.await.ok(),
        }
    }

    /// Abort any in-flight check.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for MountedBanner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FixedSource {
        status: DeploymentStatus,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatusSource for FixedSource {
        async fn fetch_status(&self) -> Result<DeploymentStatus, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.status.clone())
        }
    }

    fn settings(environment: Environment) -> BannerSettings {
        BannerSettings {
            environment,
            guide_path: "/deploy".to_string(),
            hidden_path_prefixes: vec!["/deploy".to_string()],
            fetch_timeout: Duration::from_secs(5),
        }
    }

    fn banner(environment: Environment, deployed: bool) -> (DeployBanner, Arc<FixedSource>) {
        let source = Arc::new(FixedSource {
            status: DeploymentStatus {
                deployed,
                reason: "test".to_string(),
            },
            calls: AtomicUsize::new(0),
        });
        let cache = StatusCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
        (
            DeployBanner::new(settings(environment), cache, source.clone()),
            source,
        )
    }

    #[test]
    fn test_visible_by_default_in_development() {
        let (banner, _) = banner(Environment::Development, false);
        assert!(banner.is_visible(Some("/")));
        assert!(banner.is_visible(None));
    }

    #[test]
    fn test_hidden_under_excluded_prefix() {
        let (banner, _) = banner(Environment::Development, false);
        assert!(!banner.is_visible(Some("/deploy")));
        assert!(!banner.is_visible(Some("/deploy/vercel")));
        assert!(banner.is_visible(Some("/marketing")));
    }

    #[test]
    fn test_hidden_outside_development() {
        let (production, _) = banner(Environment::Production, false);
        assert!(!production.is_visible(Some("/")));
        let (test, _) = banner(Environment::Test, false);
        assert!(!test.is_visible(Some("/")));
    }

    #[tokio::test]
    async fn test_production_mount_skips_check() {
        let (banner, source) = banner(Environment::Production, true);
        let outcome = banner.mount().finished().await;
        assert_eq!(outcome, Some(CheckOutcome::Skipped));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confirmed_deployment_hides_banner() {
        let (banner, source) = banner(Environment::Development, true);
        let outcome = banner.mount().finished().await;
        assert!(matches!(outcome, Some(CheckOutcome::Checked(ref s)) if s.deployed));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!banner.is_visible(Some("/")));
    }

    #[tokio::test]
    async fn test_negative_status_keeps_banner() {
        let (banner, _) = banner(Environment::Development, false);
        banner.mount().finished().await;
        assert!(banner.is_visible(Some("/")));
    }

    #[test]
    fn test_render_markup() {
        let tera = crate::templates::init_templates().unwrap();
        let (banner, _) = banner(Environment::Development, false);

        let html = banner.render(&tera, Some("/")).unwrap().unwrap();
        assert!(html.contains("role=\"banner\""));
        // Tera escapes '/' in autoescaped .html templates
        assert!(html.contains("href=\"&#x2F;deploy\""));
        assert!(banner.render(&tera, Some("/deploy")).unwrap().is_none());
    }

    #[test]
    fn test_render_links_to_guide_not_first_hidden_prefix() {
        let tera = crate::templates::init_templates().unwrap();
        let settings = BannerSettings {
            hidden_path_prefixes: vec!["/launch".to_string(), "/deploy".to_string()],
            ..settings(Environment::Development)
        };
        let cache = StatusCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
        let source = Arc::new(FixedSource {
            status: DeploymentStatus::not_deployed("test"),
            calls: AtomicUsize::new(0),
        });
        let banner = DeployBanner::new(settings, cache, source);

        let html = banner.render(&tera, Some("/")).unwrap().unwrap();
        assert!(html.contains("href=\"&#x2F;deploy\""), "{}", html);
        assert!(!html.contains("launch"), "{}", html);
        assert!(banner.render(&tera, Some("/launch/step-2")).unwrap().is_none());
    }
}
