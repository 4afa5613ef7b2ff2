//! Shared fixtures for integration tests

#![allow(dead_code)]

use mealops_access::{
    Division, GrantWriter, InMemoryDirectory, Role, Site, SiteGroup, Staff, User,
};
use std::sync::Arc;

/// Directory seeded with the scenarios used across the integration suites.
///
/// - `root`: super admin without staff record
/// - `u1` / `s1`: site staff, direct grant to `A`, removed direct grant to `B`
/// - `u2` / `s2`: site staff, group grant to `G1` = {C, D operational, E deactivated}
/// - `u3` / `s3`: site manager with a staff record and no grants
/// - `driver`: delivery driver without staff record
/// - `X`: deleted site, `F`: ungrouped operational site
pub async fn seeded_directory() -> Arc<InMemoryDirectory> {
    let dir = Arc::new(InMemoryDirectory::new());

    dir.insert_user(User::new("root", Role::SuperAdmin)).await;
    dir.insert_user(User::new("U1", Role::SiteStaff).with_division(Division::Headquarters)).await;
    dir.insert_user(User::new("U2", Role::SiteStaff).with_division(Division::Branch)).await;
    dir.insert_user(User::new("U3", Role::SiteManager)).await;
    dir.insert_user(User::new("driver", Role::DeliveryDriver)).await;

    dir.insert_staff(Staff::new("S1", "U1")).await.unwrap();
    dir.insert_staff(Staff::new("S2", "U2")).await.unwrap();
    dir.insert_staff(Staff::new("S3", "U3")).await.unwrap();

    dir.insert_group(SiteGroup::new("G1", "Harbour kitchens", Division::Branch)).await;

    dir.insert_site(Site::new("A", Division::Headquarters)).await;
    dir.insert_site(Site::new("B", Division::Headquarters)).await;
    dir.insert_site(Site::new("C", Division::Branch).in_group("G1")).await;
    dir.insert_site(Site::new("D", Division::Branch).in_group("G1")).await;
    dir.insert_site(Site::new("E", Division::Branch).in_group("G1").deactivated()).await;
    dir.insert_site(Site::new("F", Division::Consignment)).await;
    dir.insert_site(
        Site::new("X", Division::Consignment).deleted_at(chrono::Utc::now()),
    )
    .await;

    dir.assign_site("S1", "A").await.unwrap();
    dir.assign_site("S1", "B").await.unwrap();
    dir.unassign_site("S1", "B").await.unwrap();

    dir.assign_group("S2", "G1").await.unwrap();

    dir
}

/// Sorted set helper
pub fn ids(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
