//! Grant/revoke reconciliation
//!
//! For every principal kind the target supports, principals in the plan but
//! not currently granted are granted in one call, and principals currently
//! granted but absent from the plan are revoked in one call. Kinds with
//! nothing to change cost no call at all.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info};
use thiserror::Error;
use tfjuju_client::{AccessClient, AccessRequest, ClientError, ClientResult, PrincipalKind, Tag, TupleFilter};

use super::Principals;

/// Page size requested when reading back relationship tuples
const READ_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Grant,
    Revoke,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Grant => write!(f, "grant"),
            Operation::Revoke => write!(f, "revoke"),
        }
    }
}

/// Changes needed for one principal kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalDiff {
    pub kind: PrincipalKind,
    pub to_grant: BTreeSet<String>,
    pub to_revoke: BTreeSet<String>,
}

impl PrincipalDiff {
    pub fn is_empty(&self) -> bool {
        self.to_grant.is_empty() && self.to_revoke.is_empty()
    }
}

/// A grant or revoke call failed part way through reconciliation
#[derive(Debug, Error)]
#[error("failed to {operation} access for {kind} {ids:?}: {source}")]
pub struct ReconcileError {
    pub operation: Operation,
    pub kind: PrincipalKind,
    pub ids: Vec<String>,
    /// Principals as granted after the calls that did succeed
    pub applied: Principals,
    pub source: ClientError,
}

/// Per-kind set differences between `desired` and `current`
pub fn diff_principals(
    desired: &Principals,
    current: &Principals,
    kinds: &[PrincipalKind],
) -> Vec<PrincipalDiff> {
    kinds
        .iter()
        .map(|&kind| {
            let want = desired.get(kind);
            let have = current.get(kind);
            PrincipalDiff {
                kind,
                to_grant: want.difference(have).cloned().collect(),
                to_revoke: have.difference(want).cloned().collect(),
            }
        })
        .collect()
}

/// Bring the grants of `access` on `target` from `current` to `desired`.
///
/// Returns the principals granted afterwards. On failure the error carries
/// the principals as applied up to the failing call; nothing after it is
/// attempted.
pub async fn reconcile(
    client: &dyn AccessClient,
    target: &Tag,
    access: &str,
    desired: &Principals,
    current: &Principals,
    kinds: &[PrincipalKind],
) -> Result<Principals, ReconcileError> {
    let mut applied = current.clone();

    for diff in diff_principals(desired, current, kinds) {
        if diff.is_empty() {
            debug!("No {} changes for {} access on {}", diff.kind, access, target);
            continue;
        }

        for (operation, ids) in [
            (Operation::Grant, &diff.to_grant),
            (Operation::Revoke, &diff.to_revoke),
        ] {
            if ids.is_empty() {
                continue;
            }

            let request = AccessRequest {
                target: target.clone(),
                access: access.to_string(),
                principal_kind: diff.kind,
                principals: ids.iter().cloned().collect(),
            };
            info!(
                "{} {} access on {} for {} {:?}",
                operation, access, target, diff.kind, request.principals
            );

            let result = match operation {
                Operation::Grant => client.grant_access(&request).await,
                Operation::Revoke => client.revoke_access(&request).await,
            };
            if let Err(source) = result {
                return Err(ReconcileError {
                    operation,
                    kind: diff.kind,
                    ids: request.principals,
                    applied,
                    source,
                });
            }

            let granted = applied.get_mut(diff.kind);
            match operation {
                Operation::Grant => granted.extend(ids.iter().cloned()),
                Operation::Revoke => granted.retain(|id| !ids.contains(id)),
            }
        }
    }

    Ok(applied)
}

/// Read the principals currently holding `access` on `target`, following
/// continuation tokens until the listing is exhausted.
pub async fn read_current(
    client: &dyn AccessClient,
    target: &Tag,
    access: &str,
    kinds: &[PrincipalKind],
) -> ClientResult<Principals> {
    let prefixes: BTreeSet<&str> = kinds.iter().map(|k| k.object_prefix()).collect();
    let mut current = Principals::default();

    for prefix in prefixes {
        let mut filter = TupleFilter {
            target_object: target.to_string(),
            relation: Some(access.to_string()),
            object_prefix: Some(prefix.to_string()),
            page_size: Some(READ_PAGE_SIZE),
            continuation_token: None,
        };

        loop {
            let page = client.list_relationship_tuples(&filter).await?;
            for tuple in page.tuples {
                match PrincipalKind::parse_object(&tuple.object) {
                    Some((kind, id)) if kinds.contains(&kind) => {
                        current.get_mut(kind).insert(id);
                    }
                    _ => debug!("Ignoring tuple object {} on {}", tuple.object, target),
                }
            }

            match page.continuation_token.filter(|t| !t.is_empty()) {
                Some(token) => filter.continuation_token = Some(token),
                None => break,
            }
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AccessCall, FakeAccessClient};

    const GROUP_A: &str = "0b7d4f2e-1a0f-4b7e-8f0d-2f6f4c1e9a55";

    fn cloud() -> Tag {
        Tag::parse("cloud-aws").unwrap()
    }

    fn users(ids: &[&str]) -> Principals {
        Principals {
            users: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_diff_is_disjoint_and_minimal() {
        let desired = users(&["a", "b"]);
        let current = users(&["b", "c"]);
        let diffs = diff_principals(&desired, &current, &PrincipalKind::ALL);

        let user_diff = &diffs[0];
        assert_eq!(user_diff.kind, PrincipalKind::User);
        assert_eq!(user_diff.to_grant, BTreeSet::from(["a".to_string()]));
        assert_eq!(user_diff.to_revoke, BTreeSet::from(["c".to_string()]));
        assert!(user_diff.to_grant.is_disjoint(&user_diff.to_revoke));
        assert!(diffs[1..].iter().all(PrincipalDiff::is_empty));
    }

    #[tokio::test]
    async fn test_update_grants_and_revokes_difference() {
        let _ = env_logger::builder().is_test(true).try_init();
        let client = FakeAccessClient::new();
        client.seed(&cloud(), "can_addmodel", PrincipalKind::User, &["b", "c"]);

        let current = read_current(&client, &cloud(), "can_addmodel", &PrincipalKind::ALL)
            .await
            .unwrap();
        assert_eq!(current, users(&["b", "c"]));

        let applied = reconcile(
            &client,
            &cloud(),
            "can_addmodel",
            &users(&["a", "b"]),
            &current,
            &PrincipalKind::ALL,
        )
        .await
        .unwrap();

        assert_eq!(applied, users(&["a", "b"]));
        assert_eq!(
            client.mutations(),
            vec![
                AccessCall::Grant(PrincipalKind::User, vec!["a".to_string()]),
                AccessCall::Revoke(PrincipalKind::User, vec!["c".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let client = FakeAccessClient::new();
        let desired = Principals {
            users: BTreeSet::from(["a@x.com".to_string()]),
            groups: BTreeSet::from([GROUP_A.to_string()]),
            ..Default::default()
        };

        reconcile(&client, &cloud(), "admin", &desired, &Principals::default(), &PrincipalKind::ALL)
            .await
            .unwrap();
        assert_eq!(client.mutations().len(), 2);

        let current = read_current(&client, &cloud(), "admin", &PrincipalKind::ALL)
            .await
            .unwrap();
        assert_eq!(current, desired);

        client.clear_calls();
        reconcile(&client, &cloud(), "admin", &desired, &current, &PrincipalKind::ALL)
            .await
            .unwrap();
        assert!(client.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_revokes_everything() {
        let client = FakeAccessClient::new();
        client.seed(&cloud(), "admin", PrincipalKind::User, &["a@x.com"]);
        client.seed(&cloud(), "admin", PrincipalKind::ServiceAccount, &["ci-bot"]);

        let current = read_current(&client, &cloud(), "admin", &PrincipalKind::ALL)
            .await
            .unwrap();
        let applied = reconcile(
            &client,
            &cloud(),
            "admin",
            &Principals::default(),
            &current,
            &PrincipalKind::ALL,
        )
        .await
        .unwrap();

        assert!(applied.is_empty());
        assert!(client.tuples().is_empty());
        assert!(
            client
                .mutations()
                .iter()
                .all(|call| matches!(call, AccessCall::Revoke(..)))
        );
    }

    #[tokio::test]
    async fn test_partial_failure_reports_applied_state() {
        let client = FakeAccessClient::new();
        client.fail_on(Operation::Grant, PrincipalKind::Group);

        let desired = Principals {
            users: BTreeSet::from(["a@x.com".to_string()]),
            groups: BTreeSet::from([GROUP_A.to_string()]),
            ..Default::default()
        };
        let err = reconcile(&client, &cloud(), "admin", &desired, &Principals::default(), &PrincipalKind::ALL)
            .await
            .unwrap_err();

        assert_eq!(err.operation, Operation::Grant);
        assert_eq!(err.kind, PrincipalKind::Group);
        assert_eq!(err.ids, vec![GROUP_A.to_string()]);
        assert_eq!(err.applied, users(&["a@x.com"]));
        assert!(err.to_string().starts_with("failed to grant access for groups"));
    }

    #[tokio::test]
    async fn test_read_current_follows_pages() {
        let client = FakeAccessClient::new();
        let ids = ["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"];
        client.seed(&cloud(), "admin", PrincipalKind::User, &ids);
        client.seed(&cloud(), "reader", PrincipalKind::User, &["z@x.com"]);

        let current = read_current(&client, &cloud(), "admin", &[PrincipalKind::User])
            .await
            .unwrap();

        assert_eq!(current, users(&ids));
        let lists = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, AccessCall::List))
            .count();
        assert_eq!(lists, 3);
    }

    #[tokio::test]
    async fn test_read_current_skips_unrequested_kinds() {
        let client = FakeAccessClient::new();
        client.seed(&cloud(), "admin", PrincipalKind::User, &["a@x.com"]);
        client.seed(&cloud(), "admin", PrincipalKind::ServiceAccount, &["ci-bot"]);

        let current = read_current(&client, &cloud(), "admin", &[PrincipalKind::ServiceAccount])
            .await
            .unwrap();
        assert!(current.users.is_empty());
        assert_eq!(current.service_accounts, BTreeSet::from(["ci-bot".to_string()]));
    }
}
