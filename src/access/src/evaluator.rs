//! Access evaluator
//!
//! Answers "can this user act on this site?" and "which sites may this user
//! act on?" on top of the [`GrantResolver`] and the directory.
//!
//! # Pipeline
//!
//! ```text
//! can_access:   user ─→ super admin? ─→ staff? ─→ direct grant? ─→ site's group granted?
//! list:         user ─→ super admin? ─→ staff? ─→ direct grants ∪ operational members of granted groups
//! ```
//!
//! A super admin may act on any site id, including deactivated or deleted
//! sites, but listings only ever enumerate operational sites for them.
//! Direct grants apply whatever the site's state; group grants only cover
//! the group's operational members, for checks and listings alike.

use crate::cache::GrantCache;
use crate::config::AccessConfig;
use crate::directory::DirectoryReader;
use crate::division::{DivisionFilter, DivisionPredicate};
use crate::error::{AccessError, Result};
use crate::grants::{log_directory_error, require_id, GrantResolver, GrantSet};
use crate::metrics::{AccessMetrics, MetricsCollector};
use crate::types::{SiteGroupId, SiteId, UserId};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a check was allowed or denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
    /// Super admin override
    SuperAdminOverride,
    /// In-force direct grant to the site
    DirectGrant,
    /// In-force grant to the site's group
    GroupGrant { group_id: SiteGroupId },
    /// Not a super admin and no staff record
    NoStaffRecord,
    /// Site is missing or has no group, and no direct grant applies
    SiteNotGrouped,
    /// Site is deactivated or deleted, and no direct grant applies
    SiteNotOperational,
    /// No grant covers the site
    NoMatchingGrant,
}

/// Outcome of a site access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub user_id: UserId,
    pub site_id: SiteId,
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl AccessDecision {
    fn allow(user_id: &str, site_id: &str, reason: DecisionReason) -> Self {
        Self::new(user_id, site_id, true, reason)
    }

    fn deny(user_id: &str, site_id: &str, reason: DecisionReason) -> Self {
        Self::new(user_id, site_id, false, reason)
    }

    fn new(user_id: &str, site_id: &str, allowed: bool, reason: DecisionReason) -> Self {
        Self {
            user_id: user_id.to_string(),
            site_id: site_id.to_string(),
            allowed,
            reason,
        }
    }
}

/// Site access evaluator
///
/// Cheap to share behind an `Arc`; all state lives in the injected
/// directory and the optional grant cache.
pub struct AccessEvaluator {
    directory: Arc<dyn DirectoryReader>,
    resolver: GrantResolver,
    divisions: DivisionFilter,
    metrics: Option<Arc<MetricsCollector>>,
    config: AccessConfig,
}

impl AccessEvaluator {
    /// Create an evaluator with the default configuration (no cache)
    pub fn new(directory: Arc<dyn DirectoryReader>) -> Self {
        Self::build(directory, AccessConfig::default())
    }

    /// Create an evaluator with the given configuration
    pub fn with_config(directory: Arc<dyn DirectoryReader>, config: AccessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(directory, config))
    }

    fn build(directory: Arc<dyn DirectoryReader>, config: AccessConfig) -> Self {
        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::new()));

        let resolver = if config.enable_cache {
            let cache = Arc::new(GrantCache::with_settings(
                config.cache_ttl,
                config.max_cache_entries,
            ));
            GrantResolver::with_cache(directory.clone(), cache).with_metrics(metrics.clone())
        } else {
            GrantResolver::new(directory.clone())
        };

        info!(
            "AccessEvaluator initialized with cache={}, metrics={}",
            config.enable_cache, config.enable_metrics
        );

        Self {
            directory,
            divisions: DivisionFilter::new(resolver.clone()),
            resolver,
            metrics,
            config,
        }
    }

    /// The grant resolver used by this evaluator
    pub fn resolver(&self) -> &GrantResolver {
        &self.resolver
    }

    /// The grant cache, if enabled
    pub fn cache(&self) -> Option<&Arc<GrantCache>> {
        self.resolver.cache()
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Can the user act on the site?
    pub async fn can_access(&self, user_id: &str, site_id: &str) -> Result<bool> {
        Ok(self.check(user_id, site_id).await?.allowed)
    }

    /// Check access and report the deciding rule
    pub async fn check(&self, user_id: &str, site_id: &str) -> Result<AccessDecision> {
        let result = self.check_inner(user_id, site_id).await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(decision) => metrics.record_check(decision.allowed).await,
                Err(err) => metrics.record_error(err).await,
            }
        }

        if let Ok(decision) = &result {
            debug!(
                "Access decision: user={}, site={}, allowed={}, reason={:?}",
                user_id, site_id, decision.allowed, decision.reason
            );
        }

        result
    }

    async fn check_inner(&self, user_id: &str, site_id: &str) -> Result<AccessDecision> {
        let user = self.resolver.find_user(user_id).await?;
        require_id("site id", site_id)?;

        // Not a check on the site's existence or state
        if user.role.is_super_admin() {
            return Ok(AccessDecision::allow(user_id, site_id, DecisionReason::SuperAdminOverride));
        }

        let resolved = self.resolver.grants_for(&user).await?;
        if !resolved.has_staff() {
            return Ok(AccessDecision::deny(user_id, site_id, DecisionReason::NoStaffRecord));
        }

        let grants = &resolved.grants;
        if grants.grants_site(site_id) {
            return Ok(AccessDecision::allow(user_id, site_id, DecisionReason::DirectGrant));
        }

        let has_group_grants = grants.group_ids().map_or(false, |ids| !ids.is_empty());
        if !has_group_grants {
            return Ok(AccessDecision::deny(user_id, site_id, DecisionReason::NoMatchingGrant));
        }

        let site = self
            .directory
            .find_site_by_id(site_id)
            .await
            .map_err(log_directory_error)?;

        let Some(site) = site else {
            return Ok(AccessDecision::deny(user_id, site_id, DecisionReason::SiteNotGrouped));
        };
        let Some(group_id) = site.group_id.clone() else {
            return Ok(AccessDecision::deny(user_id, site_id, DecisionReason::SiteNotGrouped));
        };

        // Group membership only counts for operational sites
        if !site.is_operational() {
            return Ok(AccessDecision::deny(user_id, site_id, DecisionReason::SiteNotOperational));
        }

        if grants.grants_group(&group_id) {
            Ok(AccessDecision::allow(
                user_id,
                site_id,
                DecisionReason::GroupGrant { group_id },
            ))
        } else {
            Ok(AccessDecision::deny(user_id, site_id, DecisionReason::NoMatchingGrant))
        }
    }

    /// Every site id the user may act on
    pub async fn list_accessible_site_ids(&self, user_id: &str) -> Result<BTreeSet<SiteId>> {
        let result = self.list_inner(user_id).await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.record_listing().await,
                Err(err) => metrics.record_error(err).await,
            }
        }

        result
    }

    async fn list_inner(&self, user_id: &str) -> Result<BTreeSet<SiteId>> {
        let user = self.resolver.find_user(user_id).await?;

        if user.role.is_super_admin() {
            let all = self
                .directory
                .list_all_operational_sites()
                .await
                .map_err(log_directory_error)?;
            return Ok(all.into_iter().collect());
        }

        let resolved = self.resolver.grants_for(&user).await?;
        if !resolved.has_staff() {
            return Ok(BTreeSet::new());
        }

        // Only super admins without staff resolve to the universal set
        let GrantSet::Scoped { site_ids, group_ids } = resolved.grants else {
            return Ok(BTreeSet::new());
        };

        let members = try_join_all(
            group_ids
                .iter()
                .map(|group_id| self.directory.list_operational_sites_in_group(group_id)),
        )
        .await
        .map_err(log_directory_error)?;

        let mut accessible = site_ids;
        accessible.extend(members.into_iter().flatten());

        debug!("User {} may access {} sites", user_id, accessible.len());
        Ok(accessible)
    }

    /// Division predicate for the user
    pub async fn division_filter(&self, user_id: &str) -> Result<DivisionPredicate> {
        self.divisions.division_filter(user_id).await
    }

    /// Division predicate, with unknown users mapped to `MatchNone`
    pub async fn division_predicate_or_deny(&self, user_id: &str) -> Result<DivisionPredicate> {
        self.divisions.division_predicate_or_deny(user_id).await
    }

    /// Accessible sites narrowed by the user's division predicate.
    ///
    /// Sites without a directory record only survive an unconstrained
    /// predicate.
    pub async fn list_visible_site_ids(&self, user_id: &str) -> Result<BTreeSet<SiteId>> {
        let accessible = self.list_accessible_site_ids(user_id).await?;
        let predicate = self.divisions.division_filter(user_id).await?;

        if predicate.is_unconstrained() {
            return Ok(accessible);
        }

        let sites = try_join_all(
            accessible
                .iter()
                .map(|site_id| self.directory.find_site_by_id(site_id)),
        )
        .await
        .map_err(log_directory_error)?;

        Ok(accessible
            .into_iter()
            .zip(sites)
            .filter(|(_, site)| predicate.matches(site.as_ref().map(|s| s.division)))
            .map(|(id, _)| id)
            .collect())
    }

    /// Drop cached grants for a user (no-op without a cache)
    pub fn invalidate_user(&self, user_id: &str) {
        if let Some(cache) = self.cache() {
            cache.invalidate(user_id);
        }
    }

    /// Current counters, if metrics are enabled
    pub async fn metrics(&self) -> Option<AccessMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Counters in Prometheus text format, if metrics are enabled
    pub async fn export_metrics(&self) -> Option<String> {
        match &self.metrics {
            Some(metrics) => Some(metrics.export_prometheus().await),
            None => None,
        }
    }
}

/// Shorthand used by request handlers: deny on any error except directory
/// failures, which are returned so the handler can answer with a server
/// error.
pub async fn require_access(
    evaluator: &AccessEvaluator,
    user_id: &str,
    site_id: &str,
) -> Result<bool> {
    match evaluator.can_access(user_id, site_id).await {
        Ok(allowed) => Ok(allowed),
        Err(err) if err.is_authorization_failure() => Ok(false),
        Err(err @ AccessError::InvalidInput(_)) => {
            debug!("Rejected access check: {}", err);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
