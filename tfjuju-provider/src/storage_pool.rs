//! `juju_storage_pool` resource
//!
//! Storage pool changes reach the model asynchronously. Create and update
//! wait until the pool reads back with the planned provider and attributes;
//! delete waits until the pool is gone.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;
use tfjuju_client::tag::is_valid_uuid;
use tfjuju_client::{ClientError, StoragePool, StoragePoolClient, StoragePoolKey};
use tfjuju_core::provider::{ProviderError, ProviderResult};
use tfjuju_core::resource::{Resource, ResourceId, State, Value, get_string, get_string_map};
use tfjuju_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use tfjuju_core::wait::{Assertion, Check, WaitConfig, WaitFor, WaitForError, wait_for, wait_for_error};

use crate::provider::{ManagedResource, ensure_in_place};

pub const RESOURCE_TYPE: &str = "juju_storage_pool";

fn validate_model_uuid(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if is_valid_uuid(s) => Ok(()),
        Value::String(s) => Err(format!("{:?} is not a valid model UUID", s)),
        _ => Err("Expected string".to_string()),
    }
}

/// The pool reports the planned storage provider
struct ProviderIs(String);

impl Assertion<StoragePool> for ProviderIs {
    fn check(&self, pool: &StoragePool) -> Check {
        if pool.provider == self.0 {
            Check::Satisfied
        } else {
            // A pool never changes provider
            Check::Fatal(format!(
                "storage pool {} has provider {}, expected {}",
                pool.name, pool.provider, self.0
            ))
        }
    }
}

/// The pool reports exactly the planned attributes
struct AttributesMatch(HashMap<String, String>);

impl Assertion<StoragePool> for AttributesMatch {
    fn check(&self, pool: &StoragePool) -> Check {
        if pool.attributes == self.0 {
            Check::Satisfied
        } else {
            Check::Retry(format!("storage pool {} attributes not yet applied", pool.name))
        }
    }
}

pub struct StoragePoolResource {
    client: Arc<dyn StoragePoolClient>,
    wait: WaitConfig,
    cancel: CancellationToken,
}

impl StoragePoolResource {
    pub fn new(client: Arc<dyn StoragePoolClient>, wait: WaitConfig, cancel: CancellationToken) -> Self {
        Self {
            client,
            wait,
            cancel,
        }
    }

    fn planned(&self, resource: &Resource) -> ProviderResult<(StoragePoolKey, StoragePool)> {
        self.schema()
            .validate(&resource.attributes)
            .map_err(|errors| ProviderError::validation(resource.id.clone(), errors))?;

        let attrs = &resource.attributes;
        let key = StoragePoolKey {
            model_uuid: get_string(attrs, "model_uuid").unwrap_or_default().to_string(),
            name: get_string(attrs, "name").unwrap_or_default().to_string(),
        };
        let pool = StoragePool {
            name: key.name.clone(),
            provider: get_string(attrs, "storage_provider")
                .unwrap_or_default()
                .to_string(),
            attributes: get_string_map(attrs, "attributes"),
        };
        Ok((key, pool))
    }

    /// Wait until the pool reads back as planned.
    ///
    /// The pool exists by the time this runs, so callers report the planned
    /// pool as partial state when it fails.
    async fn converge(&self, key: &StoragePoolKey, pool: &StoragePool) -> ProviderResult<StoragePool> {
        let client = self.client.clone();
        wait_for(
            WaitFor::new(format!("storage pool {}", key.name), key.clone(), move |key: StoragePoolKey| {
                let client = client.clone();
                async move { client.get_storage_pool(&key).await }
            })
            .assert(ProviderIs(pool.provider.clone()))
            .assert(AttributesMatch(pool.attributes.clone()))
            .with_config(self.wait)
            .with_cancellation(self.cancel.clone()),
        )
        .await
        .map_err(|e| ProviderError::new("Storage pool did not converge").with_cause(e))
    }
}

fn identifier(key: &StoragePoolKey) -> String {
    format!("{}:{}", key.model_uuid, key.name)
}

/// `<model-UUID>:<pool-name>`
fn parse_identifier(id: &ResourceId, identifier: &str) -> ProviderResult<StoragePoolKey> {
    identifier
        .split_once(':')
        .filter(|(model_uuid, name)| is_valid_uuid(model_uuid) && !name.is_empty())
        .map(|(model_uuid, name)| StoragePoolKey {
            model_uuid: model_uuid.to_string(),
            name: name.to_string(),
        })
        .ok_or_else(|| {
            ProviderError::new(format!(
                "Invalid storage pool ID {:?}, expected <model-UUID>:<pool-name>",
                identifier
            ))
            .for_resource(id.clone())
        })
}

fn state(id: &ResourceId, key: &StoragePoolKey, pool: StoragePool) -> State {
    let mut attributes = HashMap::from([
        ("model_uuid".to_string(), Value::String(key.model_uuid.clone())),
        ("name".to_string(), Value::String(pool.name)),
        ("storage_provider".to_string(), Value::String(pool.provider)),
    ]);
    if !pool.attributes.is_empty() {
        attributes.insert(
            "attributes".to_string(),
            Value::Map(
                pool.attributes
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ),
        );
    }
    State::existing(id.clone(), attributes).with_identifier(identifier(key))
}

#[async_trait]
impl ManagedResource for StoragePoolResource {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(RESOURCE_TYPE)
            .attribute(
                AttributeSchema::new("model_uuid", types::custom_string("ModelUuid", validate_model_uuid))
                    .required()
                    .requires_replace(),
            )
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .requires_replace(),
            )
            .attribute(
                AttributeSchema::new("storage_provider", types::non_empty_string())
                    .required()
                    .requires_replace()
                    .with_description("Storage provider type, e.g. lxd, ebs or tmpfs"),
            )
            .attribute(
                AttributeSchema::new("attributes", AttributeType::Map(Box::new(AttributeType::String)))
                    .with_description("Provider specific pool configuration"),
            )
            .with_description("A storage pool within a model")
    }

    fn import_hint(&self) -> Option<&'static str> {
        Some("<model-UUID>:<pool-name>")
    }

    async fn read(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let key = parse_identifier(id, identifier)?;
        match self.client.get_storage_pool(&key).await {
            Ok(pool) => Ok(state(id, &key, pool)),
            Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
            Err(e) => Err(ProviderError::new("Failed to read storage pool")
                .for_resource(id.clone())
                .with_cause(e)),
        }
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let (key, pool) = self.planned(resource)?;

        info!("Creating storage pool {} ({})", key.name, pool.provider);
        self.client
            .create_storage_pool(&key.model_uuid, &pool)
            .await
            .map_err(|e| {
                ProviderError::new("Failed to create storage pool")
                    .for_resource(id.clone())
                    .with_cause(e)
            })?;

        let created = self.converge(&key, &pool).await.map_err(|e| {
            e.for_resource(id.clone())
                .with_partial_state(state(id, &key, pool.clone()))
        })?;
        Ok(state(id, &key, created))
    }

    async fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (key, pool) = self.planned(to)?;
        ensure_in_place(&self.schema(), from, to)?;
        if parse_identifier(id, identifier)? != key {
            return Err(ProviderError::new("Storage pool identity changed, replace the resource instead")
                .for_resource(id.clone()));
        }

        info!("Updating storage pool {}", key.name);
        self.client
            .update_storage_pool(&key.model_uuid, &pool)
            .await
            .map_err(|e| {
                ProviderError::new("Failed to update storage pool")
                    .for_resource(id.clone())
                    .with_cause(e)
            })?;

        let updated = self.converge(&key, &pool).await.map_err(|e| {
            e.for_resource(id.clone())
                .with_partial_state(state(id, &key, pool.clone()))
        })?;
        Ok(state(id, &key, updated))
    }

    async fn delete(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let key = parse_identifier(id, identifier)?;

        info!("Removing storage pool {}", key.name);
        match self.client.remove_storage_pool(&key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                return Err(ProviderError::new("Failed to remove storage pool")
                    .for_resource(id.clone())
                    .with_cause(e));
            }
        }

        let client = self.client.clone();
        wait_for_error(
            WaitForError::new(
                format!("removal of storage pool {}", key.name),
                key.clone(),
                move |key: StoragePoolKey| {
                    let client = client.clone();
                    async move { client.get_storage_pool(&key).await }
                },
                ClientError::is_not_found,
            )
            .with_config(self.wait)
            .with_cancellation(self.cancel.clone()),
        )
        .await
        .map_err(|e| {
            ProviderError::new("Storage pool was not removed")
                .for_resource(id.clone())
                .with_cause(e)
        })
    }

    async fn import(&self, id: &ResourceId, import_id: &str) -> ProviderResult<State> {
        let state = self.read(id, import_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!("No storage pool {}", import_id))
                .for_resource(id.clone()));
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::FakeStorageClient;
    use tfjuju_core::wait::WaitError;

    const MODEL_UUID: &str = "6d8e8f8a-3c8b-4c59-9e57-4b0c3a3d7f11";

    fn wait() -> WaitConfig {
        WaitConfig::new(Duration::from_secs(20), Duration::from_secs(1))
    }

    fn pools(client: &Arc<FakeStorageClient>) -> StoragePoolResource {
        StoragePoolResource::new(client.clone(), wait(), CancellationToken::new())
    }

    fn plan(attrs: &[(&str, &str)]) -> Resource {
        let mut resource = Resource::new(RESOURCE_TYPE, "fast")
            .with_attribute("model_uuid", Value::String(MODEL_UUID.to_string()))
            .with_attribute("name", Value::String("fast".to_string()))
            .with_attribute("storage_provider", Value::String("lxd".to_string()));
        if !attrs.is_empty() {
            resource = resource.with_attribute(
                "attributes",
                Value::Map(
                    attrs
                        .iter()
                        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                        .collect(),
                ),
            );
        }
        resource
    }

    fn key() -> StoragePoolKey {
        StoragePoolKey {
            model_uuid: MODEL_UUID.to_string(),
            name: "fast".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_until_visible() {
        let _ = env_logger::builder().is_test(true).try_init();
        let client = Arc::new(FakeStorageClient::new().with_lag(2));
        let resource = pools(&client);

        let state = resource
            .create(&plan(&[("zfs.pool_name", "tank")]))
            .await
            .unwrap();

        assert_eq!(state.identifier, Some(format!("{}:fast", MODEL_UUID)));
        assert_eq!(client.reads(), 3);
        assert!(matches!(
            state.attributes.get("attributes"),
            Some(Value::Map(m)) if m.len() == 1
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_fails_fast_on_wrong_provider() {
        let client = Arc::new(FakeStorageClient::new());
        client.report_provider("tmpfs");

        let err = pools(&client).create(&plan(&[])).await.unwrap_err();

        assert!(matches!(
            err.cause.as_deref().and_then(|c| c.downcast_ref::<WaitError<ClientError>>()),
            Some(WaitError::Assertion { .. })
        ));
        assert_eq!(client.reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_timeout_keeps_pool_in_state() {
        let client = Arc::new(FakeStorageClient::new().with_lag(1000));

        let err = pools(&client)
            .create(&plan(&[("size", "1G")]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert!(client.contains(&key()));
        let partial = err.partial_state.as_deref().unwrap();
        assert!(partial.exists);
        assert_eq!(partial.identifier, Some(format!("{}:fast", MODEL_UUID)));
        assert_eq!(
            partial.attributes.get("storage_provider"),
            Some(&Value::String("lxd".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_replaces_attributes() {
        let client = Arc::new(FakeStorageClient::new());
        let resource = pools(&client);
        let from = resource.create(&plan(&[("size", "1G")])).await.unwrap();

        let identifier = format!("{}:fast", MODEL_UUID);
        let state = resource
            .update(&from.id, &identifier, &from, &plan(&[("size", "2G")]))
            .await
            .unwrap();

        let read = resource.read(&state.id, &identifier).await.unwrap();
        assert_eq!(read.attributes, state.attributes);
        assert!(matches!(
            read.attributes.get("attributes"),
            Some(Value::Map(m)) if m.get("size") == Some(&Value::String("2G".to_string()))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_rejects_provider_change() {
        let client = Arc::new(FakeStorageClient::new());
        let resource = pools(&client);
        let from = resource.create(&plan(&[])).await.unwrap();

        let to = plan(&[]).with_attribute("storage_provider", Value::String("ebs".to_string()));
        let err = resource
            .update(&from.id, &format!("{}:fast", MODEL_UUID), &from, &to)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("storage_provider requires replacement"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_until_gone() {
        let client = Arc::new(FakeStorageClient::new().with_lag(1));
        let resource = pools(&client);
        let state = resource.create(&plan(&[])).await.unwrap();
        let reads_before = client.reads();

        resource
            .delete(&state.id, &format!("{}:fast", MODEL_UUID))
            .await
            .unwrap();

        assert!(!client.contains(&key()));
        assert_eq!(client.reads() - reads_before, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_missing_pool_is_not_found() {
        let client = Arc::new(FakeStorageClient::new());
        let id = ResourceId::new(RESOURCE_TYPE, "fast");

        let state = pools(&client)
            .read(&id, &format!("{}:fast", MODEL_UUID))
            .await
            .unwrap();
        assert!(!state.exists);

        assert!(pools(&client).read(&id, "fast").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_fails() {
        let client = Arc::new(FakeStorageClient::new().with_lag(100));
        let cancel = CancellationToken::new();
        let resource = StoragePoolResource::new(client.clone(), wait(), cancel.clone());
        cancel.cancel();

        let err = resource.create(&plan(&[])).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
