//! tfjuju Provider
//!
//! Juju provider implementation: JAAS access control for seven target
//! kinds, storage pools and machines.
//!
//! ## Module Structure
//!
//! - `access` - Access target kinds, the reconciler and the access resource
//! - `storage_pool` - `juju_storage_pool`
//! - `machine` - `juju_machine`
//! - `provider` - JujuProvider, client wiring and the resource registry

pub mod access;
pub mod machine;
pub mod provider;
pub mod storage_pool;

#[cfg(test)]
mod testing;

// Re-export main types
pub use access::{AccessTargetKind, GenericAccessData, Principals};
pub use provider::{Clients, JujuProvider, ManagedResource};

use tfjuju_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use tfjuju_core::resource::{Resource, ResourceId, State};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for JujuProvider {
    fn name(&self) -> &'static str {
        "juju"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.descriptors()
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.resource(&id)?.read(&id, &identifier).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.resource(&resource.id)?.create(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            self.resource(&id)?
                .update(&id, &identifier, &from, &to)
                .await
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.resource(&id)?.delete(&id, &identifier).await })
    }

    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let import_id = import_id.to_string();
        Box::pin(async move { self.resource(&id)?.import(&id, &import_id).await })
    }
}
