//! Division filter
//!
//! Derives which division's records a user may query. The predicate is a
//! narrowing clause for list and search queries; it never authorizes a
//! mutation on its own and is meant to be intersected with the user's
//! accessible sites.

use crate::error::{AccessError, Result};
use crate::grants::GrantResolver;
use crate::types::{Division, User};
use serde::Serialize;
use tracing::debug;

/// Division restriction to merge into a storage query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "division", rename_all = "snake_case")]
pub enum DivisionPredicate {
    /// Matches nothing
    MatchNone,
    /// No division restriction
    Unconstrained,
    /// Only records of this division
    Pinned(Division),
}

impl DivisionPredicate {
    /// Derive the predicate for a known user
    ///
    /// Division-admin roles are pinned to their role's division even when
    /// the user record carries a different one.
    pub fn for_user(user: &User) -> Self {
        if user.role.is_super_admin() {
            return DivisionPredicate::Unconstrained;
        }

        match user.role.pinned_division().or(user.division) {
            Some(division) => DivisionPredicate::Pinned(division),
            None => DivisionPredicate::Unconstrained,
        }
    }

    /// Whether a record with the given division passes the predicate.
    ///
    /// Records without a division only pass an unconstrained predicate.
    pub fn matches(&self, division: Option<Division>) -> bool {
        match self {
            DivisionPredicate::MatchNone => false,
            DivisionPredicate::Unconstrained => true,
            DivisionPredicate::Pinned(pinned) => division == Some(*pinned),
        }
    }

    /// Divisions to put in a `division IN (...)` clause; `None` means no clause
    pub fn allowed_divisions(&self) -> Option<Vec<Division>> {
        match self {
            DivisionPredicate::MatchNone => Some(Vec::new()),
            DivisionPredicate::Unconstrained => None,
            DivisionPredicate::Pinned(division) => Some(vec![*division]),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, DivisionPredicate::Unconstrained)
    }
}

/// Computes division predicates from the directory
#[derive(Clone)]
pub struct DivisionFilter {
    resolver: GrantResolver,
}

impl DivisionFilter {
    pub fn new(resolver: GrantResolver) -> Self {
        Self { resolver }
    }

    /// Division predicate for a user
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::UserNotFound`] for an unknown user and
    /// propagates directory failures.
    pub async fn division_filter(&self, user_id: &str) -> Result<DivisionPredicate> {
        let user = self.resolver.find_user(user_id).await?;
        let predicate = DivisionPredicate::for_user(&user);
        debug!("Division predicate for user {}: {:?}", user_id, predicate);
        Ok(predicate)
    }

    /// Like [`DivisionFilter::division_filter`], but an unknown user yields
    /// [`DivisionPredicate::MatchNone`] instead of an error.
    ///
    /// Directory failures still propagate.
    pub async fn division_predicate_or_deny(&self, user_id: &str) -> Result<DivisionPredicate> {
        match self.division_filter(user_id).await {
            Err(AccessError::UserNotFound(_)) => Ok(DivisionPredicate::MatchNone),
            other => other,
        }
    }
}
