//! Directory entities and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique user identifier
pub type UserId = String;

/// Unique staff record identifier
pub type StaffId = String;

/// Unique site identifier
pub type SiteId = String;

/// Unique site group identifier
pub type SiteGroupId = String;

/// Unique grant identifier
pub type GrantId = String;

/// Top-level organizational partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Division {
    /// Headquarters
    Headquarters,
    /// Regional branch
    Branch,
    /// Consignment operations
    Consignment,
}

impl Division {
    /// All divisions, in declaration order
    pub const ALL: [Division; 3] = [Division::Headquarters, Division::Branch, Division::Consignment];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Division::Headquarters => "HEADQUARTERS",
            Division::Branch => "BRANCH",
            Division::Consignment => "CONSIGNMENT",
        }
    }

    /// Parse the storage representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User role, determines which evaluation path is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    HeadquartersAdmin,
    BranchAdmin,
    ConsignmentAdmin,
    GroupManager,
    SiteManager,
    SiteStaff,
    DeliveryDriver,
    Client,
}

impl Role {
    /// All roles, in declaration order
    pub const ALL: [Role; 9] = [
        Role::SuperAdmin,
        Role::HeadquartersAdmin,
        Role::BranchAdmin,
        Role::ConsignmentAdmin,
        Role::GroupManager,
        Role::SiteManager,
        Role::SiteStaff,
        Role::DeliveryDriver,
        Role::Client,
    ];

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    /// The division a division-admin role is pinned to.
    ///
    /// Returns `None` for every role that is not a division admin; those
    /// roles fall back to the user's own division.
    pub fn pinned_division(&self) -> Option<Division> {
        match self {
            Role::HeadquartersAdmin => Some(Division::Headquarters),
            Role::BranchAdmin => Some(Division::Branch),
            Role::ConsignmentAdmin => Some(Division::Consignment),
            Role::SuperAdmin
            | Role::GroupManager
            | Role::SiteManager
            | Role::SiteStaff
            | Role::DeliveryDriver
            | Role::Client => None,
        }
    }

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::HeadquartersAdmin => "HEADQUARTERS_ADMIN",
            Role::BranchAdmin => "BRANCH_ADMIN",
            Role::ConsignmentAdmin => "CONSIGNMENT_ADMIN",
            Role::GroupManager => "GROUP_MANAGER",
            Role::SiteManager => "SITE_MANAGER",
            Role::SiteStaff => "SITE_STAFF",
            Role::DeliveryDriver => "DELIVERY_DRIVER",
            Role::Client => "CLIENT",
        }
    }

    /// Parse the storage representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub role: Role,
    #[serde(default)]
    pub division: Option<Division>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create an active user without a division
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            division: None,
            is_active: true,
            deleted_at: None,
        }
    }

    /// Set the user's own division
    pub fn with_division(mut self, division: Division) -> Self {
        self.division = Some(division);
        self
    }
}

/// Staff record owned by a user (at most one per user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: StaffId,
    pub user_id: UserId,
}

impl Staff {
    pub fn new(id: impl Into<StaffId>, user_id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Operational site (kitchen, canteen, client location)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: SiteId,
    pub division: Division,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub group_id: Option<SiteGroupId>,
}

impl Site {
    /// Create an active, ungrouped site
    pub fn new(id: impl Into<SiteId>, division: Division) -> Self {
        Self {
            id: id.into(),
            division,
            is_active: true,
            deleted_at: None,
            group_id: None,
        }
    }

    /// Place the site in a group
    pub fn in_group(mut self, group_id: impl Into<SiteGroupId>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Mark the site deactivated
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Mark the site soft-deleted
    pub fn deleted_at(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }

    /// Neither soft-deleted nor deactivated
    pub fn is_operational(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Named collection of sites within one division
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteGroup {
    pub id: SiteGroupId,
    pub name: String,
    pub division: Division,
}

impl SiteGroup {
    pub fn new(id: impl Into<SiteGroupId>, name: impl Into<String>, division: Division) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            division,
        }
    }
}

/// Direct grant of one site to one staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSiteGrant {
    pub id: GrantId,
    pub staff_id: StaffId,
    pub site_id: SiteId,
    #[serde(default)]
    pub removed_at: Option<DateTime<Utc>>,
}

impl StaffSiteGrant {
    pub fn is_in_force(&self) -> bool {
        self.removed_at.is_none()
    }
}

/// Grant of a whole site group to one staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffGroupGrant {
    pub id: GrantId,
    pub staff_id: StaffId,
    pub site_group_id: SiteGroupId,
    #[serde(default)]
    pub removed_at: Option<DateTime<Utc>>,
}

impl StaffGroupGrant {
    pub fn is_in_force(&self) -> bool {
        self.removed_at.is_none()
    }
}

fn default_true() -> bool {
    true
}
