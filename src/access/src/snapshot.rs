//! JSON directory snapshots
//!
//! A snapshot is a full export of the directory tables. It seeds the
//! [`InMemoryDirectory`](crate::directory::InMemoryDirectory) used by tests
//! and by the `site-access` inspection tool.

use crate::error::{AccessError, Result};
use crate::types::{Site, SiteGroup, Staff, StaffGroupGrant, StaffSiteGrant, User};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Serialized directory contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub staff: Vec<Staff>,
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub groups: Vec<SiteGroup>,
    #[serde(default)]
    pub site_grants: Vec<StaffSiteGrant>,
    #[serde(default)]
    pub group_grants: Vec<StaffGroupGrant>,
}

impl DirectorySnapshot {
    /// Parse a snapshot from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a snapshot file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&raw)
    }

    /// Write the snapshot as pretty-printed JSON
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path.as_ref(), raw).await?;
        Ok(())
    }

    /// Check ids are unique and every reference resolves
    pub fn validate(&self) -> Result<()> {
        let users = unique_ids("user", self.users.iter().map(|u| u.id.as_str()))?;
        let staff = unique_ids("staff", self.staff.iter().map(|s| s.id.as_str()))?;
        let sites = unique_ids("site", self.sites.iter().map(|s| s.id.as_str()))?;
        let groups = unique_ids("site group", self.groups.iter().map(|g| g.id.as_str()))?;

        let mut owners = HashSet::new();
        for s in &self.staff {
            if !users.contains(s.user_id.as_str()) {
                return Err(broken("staff", &s.id, "user", &s.user_id));
            }
            if !owners.insert(s.user_id.as_str()) {
                return Err(AccessError::Snapshot(format!(
                    "user {} owns more than one staff record",
                    s.user_id
                )));
            }
        }

        for site in &self.sites {
            if let Some(group_id) = &site.group_id {
                if !groups.contains(group_id.as_str()) {
                    return Err(broken("site", &site.id, "site group", group_id));
                }
            }
        }

        for g in &self.site_grants {
            if !staff.contains(g.staff_id.as_str()) {
                return Err(broken("site grant", &g.id, "staff", &g.staff_id));
            }
            if !sites.contains(g.site_id.as_str()) {
                return Err(broken("site grant", &g.id, "site", &g.site_id));
            }
        }

        for g in &self.group_grants {
            if !staff.contains(g.staff_id.as_str()) {
                return Err(broken("group grant", &g.id, "staff", &g.staff_id));
            }
            if !groups.contains(g.site_group_id.as_str()) {
                return Err(broken("group grant", &g.id, "site group", &g.site_group_id));
            }
        }

        Ok(())
    }
}

fn unique_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(AccessError::Snapshot(format!("{} with empty id", kind)));
        }
        if !seen.insert(id) {
            return Err(AccessError::Snapshot(format!("duplicate {} id {}", kind, id)));
        }
    }
    Ok(seen)
}

fn broken(kind: &str, id: &str, target: &str, target_id: &str) -> AccessError {
    AccessError::Snapshot(format!(
        "{} {} references unknown {} {}",
        kind, id, target, target_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "users": [{"id": "u-1", "role": "SITE_STAFF", "division": "BRANCH"}],
        "staff": [{"id": "s-1", "userId": "u-1"}],
        "sites": [{"id": "a", "division": "BRANCH", "groupId": "g-1"}],
        "groups": [{"id": "g-1", "name": "North", "division": "BRANCH"}],
        "siteGrants": [{"id": "sg-1", "staffId": "s-1", "siteId": "a"}],
        "groupGrants": [{"id": "gg-1", "staffId": "s-1", "siteGroupId": "g-1", "removedAt": "2024-03-01T00:00:00Z"}]
    }"#;

    #[test]
    fn test_parse_and_validate() {
        let snapshot = DirectorySnapshot::from_json(SAMPLE).unwrap();
        assert_eq!(snapshot.users.len(), 1);
        assert!(snapshot.group_grants[0].removed_at.is_some());
        snapshot.validate().unwrap();
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut snapshot = DirectorySnapshot::from_json(SAMPLE).unwrap();
        snapshot.site_grants[0].site_id = "missing".into();

        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("unknown site missing"));
    }

    #[test]
    fn test_duplicate_staff_owner_rejected() {
        let mut snapshot = DirectorySnapshot::from_json(SAMPLE).unwrap();
        snapshot.staff.push(Staff::new("s-2", "u-1"));

        assert!(matches!(snapshot.validate(), Err(AccessError::Snapshot(_))));
    }

    #[test]
    fn test_malformed_json() {
        let err = DirectorySnapshot::from_json("{ not json").unwrap_err();
        assert!(matches!(err, AccessError::Serialization(_)));
    }
}
