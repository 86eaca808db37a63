//! JAAS access resources
//!
//! One generic resource implementation serves seven target kinds. Each kind
//! is a small [`AccessTargetKind`] adapter that knows its target attribute
//! and how to turn it into a tag; the resource reads back the current grants,
//! reconciles them against the plan and saves the result.
//!
//! - `kind` - The `AccessTargetKind` trait and shared attribute handling
//! - `targets` - The seven target kind adapters
//! - `reconcile` - Grant/revoke reconciliation and read-back
//! - `resource` - The generic access resource

pub mod kind;
pub mod reconcile;
pub mod resource;
pub mod targets;

use std::collections::BTreeSet;

use thiserror::Error;
use tfjuju_client::{PrincipalKind, TagError};

pub use kind::AccessTargetKind;
pub use reconcile::{PrincipalDiff, ReconcileError, diff_principals, read_current, reconcile};
pub use resource::AccessResource;
pub use targets::{
    CloudTarget, ControllerTarget, GroupTarget, ModelTarget, OfferTarget, RoleTarget,
    ServiceAccountTarget,
};

/// Principal ids per kind. Service account ids are kept without their domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principals {
    pub users: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    pub roles: BTreeSet<String>,
    pub service_accounts: BTreeSet<String>,
}

impl Principals {
    pub fn get(&self, kind: PrincipalKind) -> &BTreeSet<String> {
        match kind {
            PrincipalKind::User => &self.users,
            PrincipalKind::Group => &self.groups,
            PrincipalKind::Role => &self.roles,
            PrincipalKind::ServiceAccount => &self.service_accounts,
        }
    }

    pub fn get_mut(&mut self, kind: PrincipalKind) -> &mut BTreeSet<String> {
        match kind {
            PrincipalKind::User => &mut self.users,
            PrincipalKind::Group => &mut self.groups,
            PrincipalKind::Role => &mut self.roles,
            PrincipalKind::ServiceAccount => &mut self.service_accounts,
        }
    }

    pub fn is_empty(&self) -> bool {
        PrincipalKind::ALL.iter().all(|kind| self.get(*kind).is_empty())
    }
}

/// Target-independent shape of an access resource
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenericAccessData {
    /// `<target-id>:<access>`, bookkeeping only
    pub id: Option<String>,
    /// Access level; validated by JAAS, not here
    pub access: String,
    pub principals: Principals,
}

/// Errors raised while shaping access data, before any remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("invalid ID {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid import ID {0:?}, expected {1}")]
    InvalidImportId(String, &'static str),

    #[error("{0} is required")]
    MissingTarget(&'static str),

    #[error("{kind} cannot be granted access to {resource_type}")]
    UnsupportedPrincipal {
        kind: PrincipalKind,
        resource_type: &'static str,
    },
}

impl AccessError {
    pub(crate) fn invalid_id(id: &str, err: TagError) -> Self {
        Self::InvalidId {
            id: id.to_string(),
            reason: err.to_string(),
        }
    }
}
