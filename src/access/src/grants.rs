//! Grant resolution
//!
//! Computes the grants in force for a user: the sites granted directly to
//! their staff record and the site groups granted to it. Users without a
//! staff record hold no grants, except super admins, who resolve to the
//! universal grant set.

use crate::cache::GrantCache;
use crate::directory::DirectoryReader;
use crate::error::{AccessError, Result};
use crate::metrics::MetricsCollector;
use crate::types::{SiteGroupId, SiteId, StaffId, User};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Grants in force for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantSet {
    /// Sentinel for super admins without a staff record: every site
    Universal,
    /// Explicit direct and group grants
    Scoped {
        site_ids: BTreeSet<SiteId>,
        group_ids: BTreeSet<SiteGroupId>,
    },
}

impl GrantSet {
    /// No grants at all
    pub fn empty() -> Self {
        GrantSet::Scoped {
            site_ids: BTreeSet::new(),
            group_ids: BTreeSet::new(),
        }
    }

    /// Build a scoped grant set
    pub fn scoped(
        site_ids: impl IntoIterator<Item = SiteId>,
        group_ids: impl IntoIterator<Item = SiteGroupId>,
    ) -> Self {
        GrantSet::Scoped {
            site_ids: site_ids.into_iter().collect(),
            group_ids: group_ids.into_iter().collect(),
        }
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, GrantSet::Universal)
    }

    /// True for a scoped set with neither site nor group grants
    pub fn is_empty(&self) -> bool {
        match self {
            GrantSet::Universal => false,
            GrantSet::Scoped { site_ids, group_ids } => site_ids.is_empty() && group_ids.is_empty(),
        }
    }

    /// Whether the site is covered by a direct grant (or universally)
    pub fn grants_site(&self, site_id: &str) -> bool {
        match self {
            GrantSet::Universal => true,
            GrantSet::Scoped { site_ids, .. } => site_ids.contains(site_id),
        }
    }

    /// Whether the group is covered by a group grant (or universally)
    pub fn grants_group(&self, group_id: &str) -> bool {
        match self {
            GrantSet::Universal => true,
            GrantSet::Scoped { group_ids, .. } => group_ids.contains(group_id),
        }
    }

    /// Directly granted site ids; `None` for the universal set
    pub fn site_ids(&self) -> Option<&BTreeSet<SiteId>> {
        match self {
            GrantSet::Universal => None,
            GrantSet::Scoped { site_ids, .. } => Some(site_ids),
        }
    }

    /// Granted group ids; `None` for the universal set
    pub fn group_ids(&self) -> Option<&BTreeSet<SiteGroupId>> {
        match self {
            GrantSet::Universal => None,
            GrantSet::Scoped { group_ids, .. } => Some(group_ids),
        }
    }
}

/// Grants together with the staff record they were resolved through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGrants {
    /// Staff record id, `None` if the user has no staff record
    pub staff_id: Option<StaffId>,
    pub grants: GrantSet,
}

impl UserGrants {
    pub fn has_staff(&self) -> bool {
        self.staff_id.is_some()
    }
}

/// Resolves the active grants of a user through the directory
#[derive(Clone)]
pub struct GrantResolver {
    directory: Arc<dyn DirectoryReader>,
    cache: Option<Arc<GrantCache>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl GrantResolver {
    /// Create a resolver that reads the directory on every call
    pub fn new(directory: Arc<dyn DirectoryReader>) -> Self {
        Self {
            directory,
            cache: None,
            metrics: None,
        }
    }

    /// Create a resolver backed by a grant cache
    pub fn with_cache(directory: Arc<dyn DirectoryReader>, cache: Arc<GrantCache>) -> Self {
        Self {
            directory,
            cache: Some(cache),
            metrics: None,
        }
    }

    /// Count cache hits and misses in this collector
    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsCollector>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The grant cache, if enabled
    pub fn cache(&self) -> Option<&Arc<GrantCache>> {
        self.cache.as_ref()
    }

    /// Resolve the grant set of a user
    ///
    /// # Errors
    ///
    /// - [`AccessError::InvalidInput`] for an empty user id
    /// - [`AccessError::UserNotFound`] if the user does not exist
    /// - [`AccessError::DirectoryUnavailable`] if the directory fails
    pub async fn resolve_grants(&self, user_id: &str) -> Result<GrantSet> {
        let user = self.find_user(user_id).await?;
        Ok(self.grants_for(&user).await?.grants)
    }

    /// Look up a user, failing with `UserNotFound` if absent.
    ///
    /// Users are always read live; only grants are cached.
    pub async fn find_user(&self, user_id: &str) -> Result<User> {
        require_id("user id", user_id)?;

        self.directory
            .find_user_by_id(user_id)
            .await
            .map_err(log_directory_error)?
            .ok_or_else(|| AccessError::UserNotFound(user_id.to_string()))
    }

    /// Resolve the grants of an already loaded user
    pub async fn grants_for(&self, user: &User) -> Result<UserGrants> {
        let Some(cache) = &self.cache else {
            return self.grants_uncached(user).await;
        };

        if let Some(cached) = cache.get(&user.id) {
            debug!("Grant cache hit for user {}", user.id);
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit().await;
            }
            return Ok(cached);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss().await;
        }

        let epoch = cache.epoch();
        let grants = self.grants_uncached(user).await?;
        cache.insert(&user.id, grants.clone(), epoch);

        Ok(grants)
    }

    async fn grants_uncached(&self, user: &User) -> Result<UserGrants> {
        let staff = self
            .directory
            .find_staff_by_user_id(&user.id)
            .await
            .map_err(log_directory_error)?;

        let Some(staff) = staff else {
            let grants = if user.role.is_super_admin() {
                GrantSet::Universal
            } else {
                GrantSet::empty()
            };
            debug!("User {} has no staff record, grants: {:?}", user.id, grants);
            return Ok(UserGrants {
                staff_id: None,
                grants,
            });
        };

        let (site_ids, group_ids) = futures::try_join!(
            self.directory.list_active_site_grants(&staff.id),
            self.directory.list_active_group_grants(&staff.id),
        )
        .map_err(log_directory_error)?;

        debug!(
            "Resolved grants for user {} (staff {}): {} sites, {} groups",
            user.id,
            staff.id,
            site_ids.len(),
            group_ids.len()
        );

        Ok(UserGrants {
            staff_id: Some(staff.id),
            grants: GrantSet::scoped(site_ids, group_ids),
        })
    }
}

/// Reject empty identifiers before touching the directory
pub(crate) fn require_id(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(AccessError::InvalidInput(format!("{} must not be empty", kind)));
    }
    Ok(())
}

pub(crate) fn log_directory_error(err: AccessError) -> AccessError {
    if matches!(err, AccessError::DirectoryUnavailable(_)) {
        warn!("Directory read failed: {}", err);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{GrantWriter, InMemoryDirectory};
    use crate::types::{Division, Role, Site, SiteGroup, Staff};

    async fn directory() -> Arc<InMemoryDirectory> {
        let dir = Arc::new(InMemoryDirectory::new());
        dir.insert_user(User::new("admin", Role::SuperAdmin)).await;
        dir.insert_user(User::new("staffed-admin", Role::SuperAdmin)).await;
        dir.insert_user(User::new("driver", Role::DeliveryDriver)).await;
        dir.insert_user(User::new("u-1", Role::SiteStaff)).await;
        dir.insert_staff(Staff::new("s-admin", "staffed-admin")).await.unwrap();
        dir.insert_staff(Staff::new("s-1", "u-1")).await.unwrap();
        dir.insert_group(SiteGroup::new("g-1", "East", Division::Headquarters)).await;
        dir.insert_site(Site::new("a", Division::Headquarters)).await;
        dir.insert_site(Site::new("b", Division::Headquarters)).await;
        dir
    }

    #[tokio::test]
    async fn test_resolve_direct_and_group_grants() {
        let dir = directory().await;
        dir.assign_site("s-1", "a").await.unwrap();
        dir.assign_site("s-1", "b").await.unwrap();
        dir.unassign_site("s-1", "b").await.unwrap();
        dir.assign_group("s-1", "g-1").await.unwrap();

        let resolver = GrantResolver::new(dir);
        let grants = resolver.resolve_grants("u-1").await.unwrap();

        assert_eq!(grants, GrantSet::scoped(["a".to_string()], ["g-1".to_string()]));
    }

    #[tokio::test]
    async fn test_no_staff_record() {
        let resolver = GrantResolver::new(directory().await);

        assert_eq!(resolver.resolve_grants("admin").await.unwrap(), GrantSet::Universal);

        let driver = resolver.resolve_grants("driver").await.unwrap();
        assert!(driver.is_empty());
        assert!(!driver.is_universal());
    }

    #[tokio::test]
    async fn test_super_admin_with_staff_resolves_actual_grants() {
        let resolver = GrantResolver::new(directory().await);
        let grants = resolver.resolve_grants("staffed-admin").await.unwrap();
        assert!(grants.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_empty_user() {
        let resolver = GrantResolver::new(directory().await);

        assert!(matches!(
            resolver.resolve_grants("ghost").await,
            Err(AccessError::UserNotFound(id)) if id == "ghost"
        ));
        assert!(matches!(
            resolver.resolve_grants("").await,
            Err(AccessError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_cached_resolution_respects_invalidation() {
        let dir = directory().await;
        let cache = Arc::new(GrantCache::new());
        let resolver = GrantResolver::with_cache(dir.clone(), cache.clone());

        dir.assign_site("s-1", "a").await.unwrap();
        assert!(resolver.resolve_grants("u-1").await.unwrap().grants_site("a"));

        // Stale until invalidated
        dir.unassign_site("s-1", "a").await.unwrap();
        assert!(resolver.resolve_grants("u-1").await.unwrap().grants_site("a"));

        cache.invalidate("u-1");
        assert!(!resolver.resolve_grants("u-1").await.unwrap().grants_site("a"));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_universal_set_covers_everything() {
        let universal = GrantSet::Universal;
        assert!(universal.grants_site("anything"));
        assert!(universal.grants_group("anything"));
        assert!(universal.site_ids().is_none());
    }
}
