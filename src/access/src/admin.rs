//! Grant administration
//!
//! Assigning or unassigning sites and site groups for a user's staff record.
//! Every successful write invalidates the user's cached grants before the
//! call returns, so no evaluator sharing the cache can answer from grants
//! that no longer exist.

use crate::cache::GrantCache;
use crate::directory::{DirectoryReader, GrantWriter};
use crate::error::{AccessError, Result};
use crate::grants::{log_directory_error, require_id};
use crate::types::{Staff, StaffGroupGrant, StaffSiteGrant};
use std::sync::Arc;
use tracing::info;

/// Grant administration service
pub struct GrantAdmin {
    directory: Arc<dyn DirectoryReader>,
    writer: Arc<dyn GrantWriter>,
    cache: Option<Arc<GrantCache>>,
}

impl GrantAdmin {
    /// Create a service without a cache to invalidate
    pub fn new(directory: Arc<dyn DirectoryReader>, writer: Arc<dyn GrantWriter>) -> Self {
        Self {
            directory,
            writer,
            cache: None,
        }
    }

    /// Invalidate this cache after every write
    pub fn with_cache(mut self, cache: Option<Arc<GrantCache>>) -> Self {
        self.cache = cache;
        self
    }

    /// Assign a site to the user's staff record
    pub async fn assign_site(&self, user_id: &str, site_id: &str) -> Result<StaffSiteGrant> {
        require_id("site id", site_id)?;
        let staff = self.staff_of(user_id).await?;

        let grant = self.writer.assign_site(&staff.id, site_id).await?;
        self.invalidate(user_id);

        info!("Assigned site {} to user {} (staff {})", site_id, user_id, staff.id);
        Ok(grant)
    }

    /// Soft-remove the user's direct grant to a site
    pub async fn unassign_site(&self, user_id: &str, site_id: &str) -> Result<bool> {
        require_id("site id", site_id)?;
        let staff = self.staff_of(user_id).await?;

        let removed = self.writer.unassign_site(&staff.id, site_id).await?;
        self.invalidate(user_id);

        if removed {
            info!("Unassigned site {} from user {} (staff {})", site_id, user_id, staff.id);
        }
        Ok(removed)
    }

    /// Assign a site group to the user's staff record
    pub async fn assign_group(&self, user_id: &str, group_id: &str) -> Result<StaffGroupGrant> {
        require_id("site group id", group_id)?;
        let staff = self.staff_of(user_id).await?;

        let grant = self.writer.assign_group(&staff.id, group_id).await?;
        self.invalidate(user_id);

        info!("Assigned site group {} to user {} (staff {})", group_id, user_id, staff.id);
        Ok(grant)
    }

    /// Soft-remove the user's grant to a site group
    pub async fn unassign_group(&self, user_id: &str, group_id: &str) -> Result<bool> {
        require_id("site group id", group_id)?;
        let staff = self.staff_of(user_id).await?;

        let removed = self.writer.unassign_group(&staff.id, group_id).await?;
        self.invalidate(user_id);

        if removed {
            info!("Unassigned site group {} from user {} (staff {})", group_id, user_id, staff.id);
        }
        Ok(removed)
    }

    async fn staff_of(&self, user_id: &str) -> Result<Staff> {
        require_id("user id", user_id)?;

        if self
            .directory
            .find_user_by_id(user_id)
            .await
            .map_err(log_directory_error)?
            .is_none()
        {
            return Err(AccessError::UserNotFound(user_id.to_string()));
        }

        self.directory
            .find_staff_by_user_id(user_id)
            .await
            .map_err(log_directory_error)?
            .ok_or_else(|| {
                AccessError::InvalidInput(format!("user {} has no staff record", user_id))
            })
    }

    fn invalidate(&self, user_id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessConfig;
    use crate::directory::InMemoryDirectory;
    use crate::evaluator::AccessEvaluator;
    use crate::types::{Division, Role, Site, User};
    use std::time::Duration;

    #[tokio::test]
    async fn test_unassign_takes_effect_immediately_with_cache() {
        let dir = Arc::new(InMemoryDirectory::new());
        dir.insert_user(User::new("u-1", Role::SiteManager)).await;
        dir.insert_user(User::new("driver", Role::DeliveryDriver)).await;
        dir.insert_staff(Staff::new("s-1", "u-1")).await.unwrap();
        dir.insert_site(Site::new("a", Division::Branch)).await;

        let evaluator = AccessEvaluator::with_config(
            dir.clone(),
            AccessConfig::default().with_cache(Duration::from_secs(300)),
        )
        .unwrap();
        let admin = GrantAdmin::new(dir.clone(), dir.clone()).with_cache(evaluator.cache().cloned());

        admin.assign_site("u-1", "a").await.unwrap();
        assert!(evaluator.can_access("u-1", "a").await.unwrap());

        assert!(admin.unassign_site("u-1", "a").await.unwrap());
        assert!(!evaluator.can_access("u-1", "a").await.unwrap());

        assert!(matches!(
            admin.assign_site("driver", "a").await,
            Err(AccessError::InvalidInput(_))
        ));
        assert!(matches!(
            admin.assign_site("ghost", "a").await,
            Err(AccessError::UserNotFound(_))
        ));
    }
}
