//! JujuProvider - resource registry and client wiring

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tfjuju_client::{AccessClient, ConfigError, ControllerConfig, MachineClient, StoragePoolClient};
use tfjuju_core::differ::{Diff, diff};
use tfjuju_core::provider::{ProviderError, ProviderResult, ResourceType};
use tfjuju_core::resource::{Resource, ResourceId, State};
use tfjuju_core::schema::ResourceSchema;
use tfjuju_core::wait::WaitConfig;

use crate::access::{
    AccessResource, CloudTarget, ControllerTarget, GroupTarget, ModelTarget, OfferTarget,
    RoleTarget, ServiceAccountTarget,
};
use crate::machine::MachineResource;
use crate::storage_pool::StoragePoolResource;

/// Client handles the provider is built from.
///
/// `access` is only present when the controller is JAAS.
#[derive(Clone)]
pub struct Clients {
    pub access: Option<Arc<dyn AccessClient>>,
    pub storage: Arc<dyn StoragePoolClient>,
    pub machines: Arc<dyn MachineClient>,
}

/// One resource type's operations
#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn resource_type(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    fn import_hint(&self) -> Option<&'static str> {
        None
    }

    async fn read(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State>;

    async fn create(&self, resource: &Resource) -> ProviderResult<State>;

    async fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State>;

    async fn delete(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()>;

    async fn import(&self, id: &ResourceId, import_id: &str) -> ProviderResult<State> {
        Err(ProviderError::new(format!(
            "{} does not support import (got {:?})",
            self.resource_type(),
            import_id
        ))
        .for_resource(id.clone()))
    }
}

/// Static description of a registered resource type
struct ResourceDescriptor {
    name: &'static str,
    schema: ResourceSchema,
    import_hint: Option<&'static str>,
}

impl ResourceType for ResourceDescriptor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn schema(&self) -> ResourceSchema {
        self.schema.clone()
    }

    fn import_hint(&self) -> Option<&'static str> {
        self.import_hint
    }
}

/// Fail when `to` can only be reached from `from` by replacement
pub(crate) fn ensure_in_place(schema: &ResourceSchema, from: &State, to: &Resource) -> ProviderResult<()> {
    match diff(schema, to, from) {
        Diff::Replace {
            id,
            changed_attributes,
            ..
        } => Err(ProviderError::new(format!(
            "Changing {} requires replacement",
            changed_attributes.join(", ")
        ))
        .for_resource(id)),
        _ => Ok(()),
    }
}

/// The Juju provider
pub struct JujuProvider {
    resources: HashMap<&'static str, Box<dyn ManagedResource>>,
    cancel: CancellationToken,
}

impl JujuProvider {
    pub fn new(clients: Clients, wait: WaitConfig) -> Self {
        let cancel = CancellationToken::new();
        let access = clients.access;

        let resources: Vec<Box<dyn ManagedResource>> = vec![
            Box::new(AccessResource::new(ModelTarget, access.clone())),
            Box::new(AccessResource::new(CloudTarget, access.clone())),
            Box::new(AccessResource::new(OfferTarget, access.clone())),
            Box::new(AccessResource::new(ServiceAccountTarget, access.clone())),
            Box::new(AccessResource::new(RoleTarget, access.clone())),
            Box::new(AccessResource::new(GroupTarget, access.clone())),
            Box::new(AccessResource::new(ControllerTarget, access)),
            Box::new(StoragePoolResource::new(clients.storage, wait, cancel.clone())),
            Box::new(MachineResource::new(clients.machines, wait, cancel.clone())),
        ];

        Self {
            resources: resources
                .into_iter()
                .map(|r| (r.resource_type(), r))
                .collect(),
            cancel,
        }
    }

    /// Build from a provider block; waiter timing follows the configuration
    pub fn from_config(config: &ControllerConfig, clients: Clients) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(clients, config.wait_config()))
    }

    /// Cancels every wait in progress; pending operations fail as cancelled
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn resource(&self, id: &ResourceId) -> ProviderResult<&dyn ManagedResource> {
        self.resources
            .get(id.resource_type.as_str())
            .map(|r| r.as_ref())
            .ok_or_else(|| {
                ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone())
            })
    }

    pub(crate) fn descriptors(&self) -> Vec<Box<dyn ResourceType>> {
        let mut types: Vec<Box<dyn ResourceType>> = self
            .resources
            .values()
            .map(|r| {
                Box::new(ResourceDescriptor {
                    name: r.resource_type(),
                    schema: r.schema(),
                    import_hint: r.import_hint(),
                }) as Box<dyn ResourceType>
            })
            .collect();
        types.sort_by_key(|t| t.name());
        types
    }
}
