//! The generic access resource

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tfjuju_client::{AccessClient, ClientError, Tag};
use tfjuju_core::provider::{ProviderError, ProviderResult};
use tfjuju_core::resource::{Resource, ResourceId, State};
use tfjuju_core::schema::ResourceSchema;

use super::reconcile::{ReconcileError, read_current, reconcile};
use super::{AccessError, AccessTargetKind, GenericAccessData, Principals};
use crate::provider::{ManagedResource, ensure_in_place};

/// Access resource for one target kind.
///
/// Current grants are always read back from JAAS, never taken from
/// persisted state, so grants made outside the provider are reconciled too.
pub struct AccessResource<K> {
    kind: K,
    client: Option<Arc<dyn AccessClient>>,
}

impl<K: AccessTargetKind> AccessResource<K> {
    /// `client` is `None` when the provider talks to a plain controller
    pub fn new(kind: K, client: Option<Arc<dyn AccessClient>>) -> Self {
        Self { kind, client }
    }

    fn client(&self, id: &ResourceId) -> ProviderResult<&dyn AccessClient> {
        self.client.as_deref().ok_or_else(|| {
            ProviderError::new(format!(
                "{} is only supported with JAAS",
                self.kind.resource_type()
            ))
            .for_resource(id.clone())
        })
    }

    /// Validate the plan and extract its target and generic data
    fn plan(&self, resource: &Resource) -> ProviderResult<(GenericAccessData, Tag)> {
        self.kind
            .schema()
            .validate(&resource.attributes)
            .map_err(|errors| ProviderError::validation(resource.id.clone(), errors))?;

        let (data, tag) = self
            .kind
            .info(&resource.attributes)
            .map_err(|e| invalid(&resource.id, e))?;
        let tag = match tag {
            Some(tag) => tag,
            None => {
                let attr = self.kind.target_attribute().unwrap_or("target");
                return Err(invalid(&resource.id, AccessError::MissingTarget(attr)));
            }
        };
        Ok((data, tag))
    }

    fn parse_identifier(&self, id: &ResourceId, identifier: &str) -> ProviderResult<(Tag, String)> {
        self.kind
            .parse_access_id(identifier)
            .map_err(|e| invalid(id, e))
    }

    async fn current(
        &self,
        id: &ResourceId,
        client: &dyn AccessClient,
        target: &Tag,
        access: &str,
    ) -> ProviderResult<Principals> {
        read_current(client, target, access, &self.kind.principal_kinds())
            .await
            .map_err(|e| remote(id, format!("Failed to read {} access on {}", access, target), e))
    }

    async fn apply(
        &self,
        id: &ResourceId,
        client: &dyn AccessClient,
        target: &Tag,
        access: &str,
        desired: &Principals,
        current: &Principals,
    ) -> ProviderResult<Principals> {
        reconcile(client, target, access, desired, current, &self.kind.principal_kinds())
            .await
            .map_err(|e| self.partial_failure(id, target, access, e))
    }

    /// State describing what was granted, or not-found when nothing is
    fn state(&self, id: &ResourceId, target: &Tag, access: &str, principals: Principals) -> State {
        if principals.is_empty() {
            return State::not_found(id.clone());
        }
        let data = GenericAccessData {
            id: Some(self.kind.access_id(target, access)),
            access: access.to_string(),
            principals,
        };
        State::existing(id.clone(), self.kind.save(&data, target))
            .with_identifier(self.kind.access_id(target, access))
    }

    fn partial_failure(
        &self,
        id: &ResourceId,
        target: &Tag,
        access: &str,
        err: ReconcileError,
    ) -> ProviderError {
        let partial = self.state(id, target, access, err.applied.clone());
        ProviderError::new(format!("Failed to reconcile {} access on {}", access, target))
            .for_resource(id.clone())
            .with_partial_state(partial)
            .with_cause(err)
    }
}

fn invalid(id: &ResourceId, err: AccessError) -> ProviderError {
    ProviderError::new("Invalid access configuration")
        .for_resource(id.clone())
        .with_cause(err)
}

fn remote(id: &ResourceId, message: String, err: ClientError) -> ProviderError {
    ProviderError::new(message)
        .for_resource(id.clone())
        .with_cause(err)
}

#[async_trait]
impl<K: AccessTargetKind> ManagedResource for AccessResource<K> {
    fn resource_type(&self) -> &'static str {
        self.kind.resource_type()
    }

    fn schema(&self) -> ResourceSchema {
        self.kind.schema()
    }

    fn import_hint(&self) -> Option<&'static str> {
        Some(self.kind.import_hint())
    }

    async fn read(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let client = self.client(id)?;
        let (target, access) = self.parse_identifier(id, identifier)?;
        let current = self.current(id, client, &target, &access).await?;
        Ok(self.state(id, &target, &access, current))
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let client = self.client(id)?;
        let (data, target) = self.plan(resource)?;

        info!("Granting {} access on {} ({})", data.access, target, id);
        let applied = self
            .apply(id, client, &target, &data.access, &data.principals, &Principals::default())
            .await?;
        Ok(self.state(id, &target, &data.access, applied))
    }

    async fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let client = self.client(id)?;
        let (data, target) = self.plan(to)?;
        ensure_in_place(&self.kind.schema(), from, to)?;

        let (prior_target, prior_access) = self.parse_identifier(id, identifier)?;
        if prior_target != target || prior_access != data.access {
            return Err(ProviderError::new(format!(
                "{} changes target or access level, replace the resource instead",
                identifier
            ))
            .for_resource(id.clone()));
        }

        let current = self.current(id, client, &target, &data.access).await?;
        let applied = self
            .apply(id, client, &target, &data.access, &data.principals, &current)
            .await?;
        Ok(self.state(id, &target, &data.access, applied))
    }

    async fn delete(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let client = self.client(id)?;
        let (target, access) = self.parse_identifier(id, identifier)?;

        info!("Revoking {} access on {} ({})", access, target, id);
        let current = self.current(id, client, &target, &access).await?;
        self.apply(id, client, &target, &access, &Principals::default(), &current)
            .await?;
        Ok(())
    }

    async fn import(&self, id: &ResourceId, import_id: &str) -> ProviderResult<State> {
        let state = self.read(id, import_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "Nothing holds the access described by {}",
                import_id
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }
}
