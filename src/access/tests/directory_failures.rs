//! Directory failure propagation
//!
//! A failing directory must surface as `DirectoryUnavailable` from every
//! operation, never as "no access" or "full access".

mod common;

use async_trait::async_trait;
use common::seeded_directory;
use mealops_access::{
    require_access, AccessConfig, AccessError, AccessEvaluator, DirectoryReader,
    InMemoryDirectory, Result, Site, SiteGroupId, SiteId, Staff, User,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failing {
    FindUser,
    FindStaff,
    SiteGrants,
    GroupGrants,
    FindSite,
    GroupMembers,
    AllSites,
}

/// Delegates to an in-memory directory, failing one read while armed
struct FlakyDirectory {
    inner: Arc<InMemoryDirectory>,
    failing: Failing,
    armed: AtomicBool,
}

impl FlakyDirectory {
    fn new(inner: Arc<InMemoryDirectory>, failing: Failing) -> Self {
        Self {
            inner,
            failing,
            armed: AtomicBool::new(true),
        }
    }

    fn check(&self, op: Failing) -> Result<()> {
        if self.failing == op && self.armed.load(Ordering::SeqCst) {
            return Err(AccessError::directory(format!("{:?} timed out", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryReader for FlakyDirectory {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.check(Failing::FindUser)?;
        self.inner.find_user_by_id(id).await
    }

    async fn find_staff_by_user_id(&self, user_id: &str) -> Result<Option<Staff>> {
        self.check(Failing::FindStaff)?;
        self.inner.find_staff_by_user_id(user_id).await
    }

    async fn list_active_site_grants(&self, staff_id: &str) -> Result<Vec<SiteId>> {
        self.check(Failing::SiteGrants)?;
        self.inner.list_active_site_grants(staff_id).await
    }

    async fn list_active_group_grants(&self, staff_id: &str) -> Result<Vec<SiteGroupId>> {
        self.check(Failing::GroupGrants)?;
        self.inner.list_active_group_grants(staff_id).await
    }

    async fn find_site_by_id(&self, id: &str) -> Result<Option<Site>> {
        self.check(Failing::FindSite)?;
        self.inner.find_site_by_id(id).await
    }

    async fn list_operational_sites_in_group(&self, group_id: &str) -> Result<Vec<SiteId>> {
        self.check(Failing::GroupMembers)?;
        self.inner.list_operational_sites_in_group(group_id).await
    }

    async fn list_all_operational_sites(&self) -> Result<Vec<SiteId>> {
        self.check(Failing::AllSites)?;
        self.inner.list_all_operational_sites().await
    }
}

async fn evaluator_failing(op: Failing) -> AccessEvaluator {
    let inner = seeded_directory().await;
    AccessEvaluator::new(Arc::new(FlakyDirectory::new(inner, op)))
}

fn is_unavailable<T: std::fmt::Debug>(result: &Result<T>) -> bool {
    matches!(result, Err(AccessError::DirectoryUnavailable(_)))
}

#[tokio::test]
async fn test_user_lookup_failure_propagates_everywhere() {
    let evaluator = evaluator_failing(Failing::FindUser).await;

    assert!(is_unavailable(&evaluator.can_access("root", "A").await));
    assert!(is_unavailable(&evaluator.list_accessible_site_ids("root").await));
    assert!(is_unavailable(&evaluator.division_filter("root").await));
    // Not downgraded to MatchNone like an unknown user
    assert!(is_unavailable(&evaluator.division_predicate_or_deny("root").await));
}

#[tokio::test]
async fn test_grant_lookup_failures_propagate() {
    for op in [Failing::FindStaff, Failing::SiteGrants, Failing::GroupGrants] {
        let evaluator = evaluator_failing(op).await;

        assert!(is_unavailable(&evaluator.can_access("U1", "A").await), "{:?}", op);
        assert!(is_unavailable(&evaluator.list_accessible_site_ids("U2").await), "{:?}", op);
    }
}

#[tokio::test]
async fn test_site_lookup_failure_on_group_path() {
    let evaluator = evaluator_failing(Failing::FindSite).await;

    // The direct grant decides before the site is read
    assert!(evaluator.can_access("U1", "A").await.unwrap());
    // The group path needs the site record
    assert!(is_unavailable(&evaluator.can_access("U2", "C").await));
}

#[tokio::test]
async fn test_listing_failures_propagate() {
    let evaluator = evaluator_failing(Failing::GroupMembers).await;
    assert!(is_unavailable(&evaluator.list_accessible_site_ids("U2").await));
    // No group grants, no member lookup
    assert!(evaluator.list_accessible_site_ids("U1").await.is_ok());

    let evaluator = evaluator_failing(Failing::AllSites).await;
    assert!(is_unavailable(&evaluator.list_accessible_site_ids("root").await));
    // The override for checks does not read sites
    assert!(evaluator.can_access("root", "A").await.unwrap());
}

#[tokio::test]
async fn test_require_access_fails_closed_with_error() {
    let evaluator = evaluator_failing(Failing::SiteGrants).await;

    let result = require_access(&evaluator, "U1", "A").await;
    assert!(is_unavailable(&result));

    let evaluator = evaluator_failing(Failing::FindStaff).await;
    assert!(!require_access(&evaluator, "ghost", "A").await.unwrap());
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let inner = seeded_directory().await;
    let flaky = Arc::new(FlakyDirectory::new(inner, Failing::SiteGrants));
    let evaluator = AccessEvaluator::with_config(
        flaky.clone(),
        AccessConfig::default().with_cache(Duration::from_secs(60)),
    )
    .unwrap();

    assert!(is_unavailable(&evaluator.can_access("U1", "A").await));

    flaky.armed.store(false, Ordering::SeqCst);
    assert!(evaluator.can_access("U1", "A").await.unwrap());

    let metrics = evaluator.metrics().await.unwrap();
    assert_eq!(metrics.directory_errors, 1);
    assert_eq!(metrics.allowed_checks, 1);
}
