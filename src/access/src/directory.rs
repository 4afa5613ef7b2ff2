//! Directory reader interface and storage backends
//!
//! The access engine never talks to storage directly. It reads users, staff
//! records, sites and grants through [`DirectoryReader`], which is injected
//! as an `Arc<dyn DirectoryReader>`. Grant mutations go through
//! [`GrantWriter`].

use crate::error::{AccessError, Result};
use crate::snapshot::DirectorySnapshot;
use crate::types::{
    Site, SiteGroup, SiteGroupId, SiteId, Staff, StaffGroupGrant, StaffId, StaffSiteGrant, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDirectory;

/// Read-only view over users, staff, sites and grants
///
/// Implementations return `Ok(None)` / empty lists for missing records and
/// reserve `Err` for backend failures, which must surface as
/// [`AccessError::DirectoryUnavailable`].
#[async_trait]
pub trait DirectoryReader: Send + Sync {
    /// Look up a user by id
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Look up the staff record owned by a user
    async fn find_staff_by_user_id(&self, user_id: &str) -> Result<Option<Staff>>;

    /// Site ids of the staff member's in-force direct grants
    async fn list_active_site_grants(&self, staff_id: &str) -> Result<Vec<SiteId>>;

    /// Group ids of the staff member's in-force group grants
    async fn list_active_group_grants(&self, staff_id: &str) -> Result<Vec<SiteGroupId>>;

    /// Look up a site by id, regardless of its activation state
    async fn find_site_by_id(&self, id: &str) -> Result<Option<Site>>;

    /// Ids of operational sites whose group is `group_id`
    async fn list_operational_sites_in_group(&self, group_id: &str) -> Result<Vec<SiteId>>;

    /// Ids of every operational site
    async fn list_all_operational_sites(&self) -> Result<Vec<SiteId>>;
}

/// Grant lifecycle operations performed by administrators
#[async_trait]
pub trait GrantWriter: Send + Sync {
    /// Assign a site to a staff member.
    ///
    /// Returns the in-force grant, creating one only if none exists.
    async fn assign_site(&self, staff_id: &str, site_id: &str) -> Result<StaffSiteGrant>;

    /// Soft-remove the in-force grant. Returns `false` if there was none.
    async fn unassign_site(&self, staff_id: &str, site_id: &str) -> Result<bool>;

    /// Assign a site group to a staff member
    async fn assign_group(&self, staff_id: &str, group_id: &str) -> Result<StaffGroupGrant>;

    /// Soft-remove the in-force group grant. Returns `false` if there was none.
    async fn unassign_group(&self, staff_id: &str, group_id: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<String, User>,
    staff: HashMap<StaffId, Staff>,
    sites: HashMap<SiteId, Site>,
    groups: HashMap<SiteGroupId, SiteGroup>,
    site_grants: Vec<StaffSiteGrant>,
    group_grants: Vec<StaffGroupGrant>,
}

/// In-memory directory
///
/// Used for tests, the inspection CLI, and small deployments that load a
/// [`DirectorySnapshot`] at startup.
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(DirectoryState::default())),
        }
    }

    /// Build a directory from a snapshot, checking referential integrity
    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Result<Self> {
        snapshot.validate()?;

        let state = DirectoryState {
            users: snapshot.users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            staff: snapshot.staff.into_iter().map(|s| (s.id.clone(), s)).collect(),
            sites: snapshot.sites.into_iter().map(|s| (s.id.clone(), s)).collect(),
            groups: snapshot.groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
            site_grants: snapshot.site_grants,
            group_grants: snapshot.group_grants,
        };

        debug!(
            "Loaded directory snapshot: {} users, {} sites, {} groups",
            state.users.len(),
            state.sites.len(),
            state.groups.len()
        );

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Export the current contents as a snapshot
    pub async fn snapshot(&self) -> DirectorySnapshot {
        let state = self.state.read().await;
        DirectorySnapshot {
            users: state.users.values().cloned().collect(),
            staff: state.staff.values().cloned().collect(),
            sites: state.sites.values().cloned().collect(),
            groups: state.groups.values().cloned().collect(),
            site_grants: state.site_grants.clone(),
            group_grants: state.group_grants.clone(),
        }
    }

    /// Insert or replace a user
    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user);
    }

    /// Insert a staff record. A user owns at most one.
    pub async fn insert_staff(&self, staff: Staff) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&staff.user_id) {
            return Err(AccessError::UserNotFound(staff.user_id));
        }

        let taken = state
            .staff
            .values()
            .any(|s| s.user_id == staff.user_id && s.id != staff.id);
        if taken {
            return Err(AccessError::InvalidInput(format!(
                "user {} already owns a staff record",
                staff.user_id
            )));
        }

        state.staff.insert(staff.id.clone(), staff);
        Ok(())
    }

    /// Insert or replace a site
    pub async fn insert_site(&self, site: Site) {
        let mut state = self.state.write().await;
        state.sites.insert(site.id.clone(), site);
    }

    /// Insert or replace a site group
    pub async fn insert_group(&self, group: SiteGroup) {
        let mut state = self.state.write().await;
        state.groups.insert(group.id.clone(), group);
    }

    /// Activate or deactivate a site
    pub async fn set_site_active(&self, site_id: &str, active: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let site = state
            .sites
            .get_mut(site_id)
            .ok_or_else(|| AccessError::InvalidInput(format!("unknown site {}", site_id)))?;
        site.is_active = active;
        Ok(())
    }

    /// Soft-delete a site
    pub async fn soft_delete_site(&self, site_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let site = state
            .sites
            .get_mut(site_id)
            .ok_or_else(|| AccessError::InvalidInput(format!("unknown site {}", site_id)))?;
        site.deleted_at.get_or_insert_with(Utc::now);
        Ok(())
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryReader for InMemoryDirectory {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(id).cloned())
    }

    async fn find_staff_by_user_id(&self, user_id: &str) -> Result<Option<Staff>> {
        let state = self.state.read().await;
        Ok(state.staff.values().find(|s| s.user_id == user_id).cloned())
    }

    async fn list_active_site_grants(&self, staff_id: &str) -> Result<Vec<SiteId>> {
        let state = self.state.read().await;
        Ok(state
            .site_grants
            .iter()
            .filter(|g| g.staff_id == staff_id && g.is_in_force())
            .map(|g| g.site_id.clone())
            .collect())
    }

    async fn list_active_group_grants(&self, staff_id: &str) -> Result<Vec<SiteGroupId>> {
        let state = self.state.read().await;
        Ok(state
            .group_grants
            .iter()
            .filter(|g| g.staff_id == staff_id && g.is_in_force())
            .map(|g| g.site_group_id.clone())
            .collect())
    }

    async fn find_site_by_id(&self, id: &str) -> Result<Option<Site>> {
        let state = self.state.read().await;
        Ok(state.sites.get(id).cloned())
    }

    async fn list_operational_sites_in_group(&self, group_id: &str) -> Result<Vec<SiteId>> {
        let state = self.state.read().await;
        Ok(state
            .sites
            .values()
            .filter(|s| s.group_id.as_deref() == Some(group_id) && s.is_operational())
            .map(|s| s.id.clone())
            .collect())
    }

    async fn list_all_operational_sites(&self) -> Result<Vec<SiteId>> {
        let state = self.state.read().await;
        Ok(state
            .sites
            .values()
            .filter(|s| s.is_operational())
            .map(|s| s.id.clone())
            .collect())
    }
}

#[async_trait]
impl GrantWriter for InMemoryDirectory {
    async fn assign_site(&self, staff_id: &str, site_id: &str) -> Result<StaffSiteGrant> {
        let mut state = self.state.write().await;

        if !state.staff.contains_key(staff_id) {
            return Err(AccessError::InvalidInput(format!("unknown staff {}", staff_id)));
        }
        if !state.sites.contains_key(site_id) {
            return Err(AccessError::InvalidInput(format!("unknown site {}", site_id)));
        }

        if let Some(existing) = state
            .site_grants
            .iter()
            .find(|g| g.staff_id == staff_id && g.site_id == site_id && g.is_in_force())
        {
            return Ok(existing.clone());
        }

        let grant = StaffSiteGrant {
            id: Uuid::new_v4().to_string(),
            staff_id: staff_id.to_string(),
            site_id: site_id.to_string(),
            removed_at: None,
        };
        state.site_grants.push(grant.clone());
        Ok(grant)
    }

    async fn unassign_site(&self, staff_id: &str, site_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut removed = false;

        for grant in state
            .site_grants
            .iter_mut()
            .filter(|g| g.staff_id == staff_id && g.site_id == site_id && g.is_in_force())
        {
            grant.removed_at = Some(now);
            removed = true;
        }

        Ok(removed)
    }

    async fn assign_group(&self, staff_id: &str, group_id: &str) -> Result<StaffGroupGrant> {
        let mut state = self.state.write().await;

        if !state.staff.contains_key(staff_id) {
            return Err(AccessError::InvalidInput(format!("unknown staff {}", staff_id)));
        }
        if !state.groups.contains_key(group_id) {
            return Err(AccessError::InvalidInput(format!("unknown site group {}", group_id)));
        }

        if let Some(existing) = state
            .group_grants
            .iter()
            .find(|g| g.staff_id == staff_id && g.site_group_id == group_id && g.is_in_force())
        {
            return Ok(existing.clone());
        }

        let grant = StaffGroupGrant {
            id: Uuid::new_v4().to_string(),
            staff_id: staff_id.to_string(),
            site_group_id: group_id.to_string(),
            removed_at: None,
        };
        state.group_grants.push(grant.clone());
        Ok(grant)
    }

    async fn unassign_group(&self, staff_id: &str, group_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut removed = false;

        for grant in state
            .group_grants
            .iter_mut()
            .filter(|g| g.staff_id == staff_id && g.site_group_id == group_id && g.is_in_force())
        {
            grant.removed_at = Some(now);
            removed = true;
        }

        Ok(removed)
    }
}
