//! # Mealops Site Access
//!
//! Site-access authorization for the meal operations platform: which
//! operational sites a user may act on.
//!
//! ## Features
//!
//! - **Direct and group grants** resolved from staff records, with
//!   soft-removal respected everywhere
//! - **Super admin override** for checks, operational-only listings
//! - **Division predicates** for narrowing list and search queries
//! - **Injected directory** (`Arc<dyn DirectoryReader>`) with in-memory and
//!   PostgreSQL backends
//! - **Optional grant cache** with synchronous invalidation on grant changes
//!
//! ## Example
//!
//! ```rust
//! use mealops_access::{AccessEvaluator, InMemoryDirectory, Division, Role, Site, Staff, User};
//! use mealops_access::directory::GrantWriter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = Arc::new(InMemoryDirectory::new());
//!     directory.insert_user(User::new("alice", Role::SiteStaff)).await;
//!     directory.insert_staff(Staff::new("staff-alice", "alice")).await?;
//!     directory.insert_site(Site::new("canteen-7", Division::Branch)).await;
//!     directory.assign_site("staff-alice", "canteen-7").await?;
//!
//!     let evaluator = AccessEvaluator::new(directory);
//!
//!     if evaluator.can_access("alice", "canteen-7").await? {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod cache;
pub mod config;
pub mod directory;
pub mod division;
pub mod error;
pub mod evaluator;
pub mod grants;
pub mod metrics;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use types::{
    Division, Role, Site, SiteGroup, Staff, StaffGroupGrant, StaffSiteGrant, User,
    GrantId, SiteGroupId, SiteId, StaffId, UserId,
};
pub use admin::GrantAdmin;
pub use cache::{CacheStats, GrantCache};
pub use config::AccessConfig;
pub use directory::{DirectoryReader, GrantWriter, InMemoryDirectory};
#[cfg(feature = "postgres")]
pub use directory::PostgresDirectory;
pub use division::{DivisionFilter, DivisionPredicate};
pub use error::{AccessError, Result};
pub use evaluator::{require_access, AccessDecision, AccessEvaluator, DecisionReason};
pub use grants::{GrantResolver, GrantSet, UserGrants};
pub use metrics::{AccessMetrics, MetricsCollector};
pub use snapshot::DirectorySnapshot;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
