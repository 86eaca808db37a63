//! JAAS access management interface
//!
//! JAAS stores access as relationship tuples: "object has relation to
//! target". Grant and revoke calls write and delete tuples for one principal
//! kind at a time; reading lists tuples, page by page.

use std::fmt;

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::tag::{Tag, with_service_account_domain, without_service_account_domain};

/// Kind of identity access is granted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrincipalKind {
    User,
    Group,
    Role,
    ServiceAccount,
}

impl PrincipalKind {
    pub const ALL: [PrincipalKind; 4] = [
        PrincipalKind::User,
        PrincipalKind::Group,
        PrincipalKind::Role,
        PrincipalKind::ServiceAccount,
    ];

    /// Tuple object naming principal `id` of this kind.
    ///
    /// Service account ids are given without their domain; groups and roles
    /// are referenced through their membership relation.
    pub fn object(self, id: &str) -> String {
        match self {
            PrincipalKind::User => format!("user-{}", id),
            PrincipalKind::ServiceAccount => format!("user-{}", with_service_account_domain(id)),
            PrincipalKind::Group => format!("group-{}#member", id),
            PrincipalKind::Role => format!("role-{}#assignee", id),
        }
    }

    /// Inverse of [`PrincipalKind::object`]
    pub fn parse_object(object: &str) -> Option<(PrincipalKind, String)> {
        if let Some(id) = object.strip_prefix("user-") {
            if without_service_account_domain(id) != id {
                return Some((
                    PrincipalKind::ServiceAccount,
                    without_service_account_domain(id).to_string(),
                ));
            }
            return Some((PrincipalKind::User, id.to_string()));
        }
        if let Some(id) = object
            .strip_prefix("group-")
            .map(|rest| rest.strip_suffix("#member").unwrap_or(rest))
        {
            return Some((PrincipalKind::Group, id.to_string()));
        }
        if let Some(id) = object
            .strip_prefix("role-")
            .map(|rest| rest.strip_suffix("#assignee").unwrap_or(rest))
        {
            return Some((PrincipalKind::Role, id.to_string()));
        }
        None
    }

    /// Prefix used when listing tuples filtered to this kind
    pub fn object_prefix(self) -> &'static str {
        match self {
            PrincipalKind::User | PrincipalKind::ServiceAccount => "user",
            PrincipalKind::Group => "group",
            PrincipalKind::Role => "role",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrincipalKind::User => "users",
            PrincipalKind::Group => "groups",
            PrincipalKind::Role => "roles",
            PrincipalKind::ServiceAccount => "service accounts",
        };
        write!(f, "{}", s)
    }
}

/// Grant or revoke `access` on `target` for principals of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub target: Tag,
    pub access: String,
    pub principal_kind: PrincipalKind,
    /// Principal ids in their stored form (service accounts without domain)
    pub principals: Vec<String>,
}

impl AccessRequest {
    /// Tuples this request writes or deletes
    pub fn tuples(&self) -> Vec<RelationshipTuple> {
        self.principals
            .iter()
            .map(|id| RelationshipTuple {
                object: self.principal_kind.object(id),
                relation: self.access.clone(),
                target_object: self.target.to_string(),
            })
            .collect()
    }
}

/// "object has relation to target_object"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipTuple {
    pub object: String,
    pub relation: String,
    pub target_object: String,
}

/// Query for [`AccessClient::list_relationship_tuples`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TupleFilter {
    /// Target tag; required
    pub target_object: String,
    pub relation: Option<String>,
    /// Restrict to objects with this prefix (see [`PrincipalKind::object_prefix`])
    pub object_prefix: Option<String>,
    pub page_size: Option<u32>,
    pub continuation_token: Option<String>,
}

/// One page of listed tuples
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TuplePage {
    pub tuples: Vec<RelationshipTuple>,
    /// Present when more tuples are available
    pub continuation_token: Option<String>,
}

/// Access management calls of the JAAS API
#[async_trait]
pub trait AccessClient: Send + Sync {
    async fn grant_access(&self, request: &AccessRequest) -> ClientResult<()>;

    async fn revoke_access(&self, request: &AccessRequest) -> ClientResult<()>;

    async fn list_relationship_tuples(&self, filter: &TupleFilter) -> ClientResult<TuplePage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_round_trip() {
        let cases = [
            (PrincipalKind::User, "alice@canonical.com", "user-alice@canonical.com"),
            (PrincipalKind::ServiceAccount, "ci-bot", "user-ci-bot@serviceaccount"),
            (PrincipalKind::Group, "g-1", "group-g-1#member"),
            (PrincipalKind::Role, "r-1", "role-r-1#assignee"),
        ];
        for (kind, id, object) in cases {
            assert_eq!(kind.object(id), object);
            assert_eq!(
                PrincipalKind::parse_object(object),
                Some((kind, id.to_string()))
            );
        }
        assert_eq!(PrincipalKind::parse_object("model-123"), None);
    }

    #[test]
    fn test_request_tuples() {
        let request = AccessRequest {
            target: Tag::parse("cloud-aws").unwrap(),
            access: "can_addmodel".to_string(),
            principal_kind: PrincipalKind::Group,
            principals: vec!["g-1".to_string()],
        };
        assert_eq!(
            request.tuples(),
            vec![RelationshipTuple {
                object: "group-g-1#member".to_string(),
                relation: "can_addmodel".to_string(),
                target_object: "cloud-aws".to_string(),
            }]
        );
    }
}
