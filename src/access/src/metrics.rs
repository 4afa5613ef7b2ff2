//! Access decision counters

use std::sync::Arc;
use tokio::sync::RwLock;

/// Access engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessMetrics {
    /// Total number of site access checks
    pub total_checks: u64,

    /// Number of allowed checks
    pub allowed_checks: u64,

    /// Number of denied checks
    pub denied_checks: u64,

    /// Number of accessible-site listings
    pub listings: u64,

    /// Grant cache hits
    pub cache_hits: u64,

    /// Grant cache misses
    pub cache_misses: u64,

    /// Number of unknown-user rejections
    pub unknown_users: u64,

    /// Number of directory failures surfaced to callers
    pub directory_errors: u64,
}

impl AccessMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_checks + self.denied_checks;
        if total == 0 {
            0.0
        } else {
            self.allowed_checks as f64 / total as f64
        }
    }

    /// Calculate grant cache hit rate
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Metrics collector
pub struct MetricsCollector {
    metrics: Arc<RwLock<AccessMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(AccessMetrics::default())),
        }
    }

    /// Record the outcome of a site access check
    pub async fn record_check(&self, allowed: bool) {
        let mut metrics = self.metrics.write().await;
        metrics.total_checks += 1;

        if allowed {
            metrics.allowed_checks += 1;
        } else {
            metrics.denied_checks += 1;
        }
    }

    /// Record a completed listing
    pub async fn record_listing(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.listings += 1;
    }

    /// Record a grant cache hit
    pub async fn record_cache_hit(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.cache_hits += 1;
    }

    /// Record a grant cache miss
    pub async fn record_cache_miss(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.cache_misses += 1;
    }

    /// Record a failed operation by error kind
    pub async fn record_error(&self, err: &crate::error::AccessError) {
        use crate::error::AccessError;

        let mut metrics = self.metrics.write().await;
        match err {
            AccessError::UserNotFound(_) => metrics.unknown_users += 1,
            AccessError::DirectoryUnavailable(_) => metrics.directory_errors += 1,
            _ => {}
        }
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> AccessMetrics {
        self.metrics.read().await.clone()
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        let mut metrics = self.metrics.write().await;
        *metrics = AccessMetrics::default();
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP site_access_checks_total Total number of site access checks
# TYPE site_access_checks_total counter
site_access_checks_total {}

# HELP site_access_allowed_total Number of allowed checks
# TYPE site_access_allowed_total counter
site_access_allowed_total {}

# HELP site_access_denied_total Number of denied checks
# TYPE site_access_denied_total counter
site_access_denied_total {}

# HELP site_access_listings_total Number of accessible-site listings
# TYPE site_access_listings_total counter
site_access_listings_total {}

# HELP site_access_cache_hits_total Grant cache hits
# TYPE site_access_cache_hits_total counter
site_access_cache_hits_total {}

# HELP site_access_cache_misses_total Grant cache misses
# TYPE site_access_cache_misses_total counter
site_access_cache_misses_total {}

# HELP site_access_unknown_users_total Requests for unknown users
# TYPE site_access_unknown_users_total counter
site_access_unknown_users_total {}

# HELP site_access_directory_errors_total Directory failures
# TYPE site_access_directory_errors_total counter
site_access_directory_errors_total {}
"#,
            metrics.total_checks,
            metrics.allowed_checks,
            metrics.denied_checks,
            metrics.listings,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics.unknown_users,
            metrics.directory_errors,
        )
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
