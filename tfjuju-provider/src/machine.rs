//! `juju_machine` resource

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;
use tfjuju_client::machine::STATUS_PENDING;
use tfjuju_client::tag::is_valid_uuid;
use tfjuju_client::{ClientError, CreateMachineInput, Machine, MachineClient};
use tfjuju_core::provider::{ProviderError, ProviderResult};
use tfjuju_core::resource::{Resource, ResourceId, State, Value, get_string};
use tfjuju_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use tfjuju_core::wait::{Check, WaitConfig, WaitFor, WaitForError, wait_for, wait_for_error};

use crate::provider::{ManagedResource, ensure_in_place};

pub const RESOURCE_TYPE: &str = "juju_machine";

const STATUS_ERROR: &str = "error";

/// Machine has left the pending state
fn provisioned(machine: &Machine) -> Check {
    match machine.status.as_str() {
        STATUS_PENDING => Check::Retry(format!("machine {} is pending", machine.machine_id)),
        STATUS_ERROR => Check::Fatal(format!("machine {} failed to provision", machine.machine_id)),
        _ => Check::Satisfied,
    }
}

/// Machine location: `<model-UUID>:<machine-id>:<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
struct MachineKey {
    model_uuid: String,
    machine_id: String,
    name: String,
}

impl MachineKey {
    fn parse(id: &ResourceId, identifier: &str) -> ProviderResult<Self> {
        let mut parts = identifier.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(model_uuid), Some(machine_id), Some(name))
                if is_valid_uuid(model_uuid) && !machine_id.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    model_uuid: model_uuid.to_string(),
                    machine_id: machine_id.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ProviderError::new(format!(
                "Invalid machine ID {:?}, expected <model-UUID>:<machine-id>:<name>",
                identifier
            ))
            .for_resource(id.clone())),
        }
    }

    fn identifier(&self) -> String {
        format!("{}:{}:{}", self.model_uuid, self.machine_id, self.name)
    }
}

fn state(id: &ResourceId, key: &MachineKey, machine: Machine) -> State {
    let mut attributes = HashMap::from([
        ("model_uuid".to_string(), Value::String(key.model_uuid.clone())),
        ("name".to_string(), Value::String(key.name.clone())),
        ("machine_id".to_string(), Value::String(machine.machine_id)),
        ("base".to_string(), Value::String(machine.base)),
    ]);
    if !machine.constraints.is_empty() {
        attributes.insert("constraints".to_string(), Value::String(machine.constraints));
    }
    if let Some(hostname) = machine.hostname {
        attributes.insert("hostname".to_string(), Value::String(hostname));
    }
    State::existing(id.clone(), attributes).with_identifier(key.identifier())
}

pub struct MachineResource {
    client: Arc<dyn MachineClient>,
    wait: WaitConfig,
    cancel: CancellationToken,
}

impl MachineResource {
    pub fn new(client: Arc<dyn MachineClient>, wait: WaitConfig, cancel: CancellationToken) -> Self {
        Self {
            client,
            wait,
            cancel,
        }
    }

    fn failed(id: &ResourceId, message: &str, err: impl std::error::Error + Send + Sync + 'static) -> ProviderError {
        ProviderError::new(message).for_resource(id.clone()).with_cause(err)
    }
}

#[async_trait]
impl ManagedResource for MachineResource {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        let model_uuid = types::custom_string("ModelUuid", |value| match value {
            Value::String(s) if is_valid_uuid(s) => Ok(()),
            _ => Err("Value must be a model UUID".to_string()),
        });

        ResourceSchema::new(RESOURCE_TYPE)
            .attribute(AttributeSchema::new("model_uuid", model_uuid).required().requires_replace())
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .requires_replace(),
            )
            .attribute(
                AttributeSchema::new("base", AttributeType::String)
                    .optional_computed()
                    .requires_replace()
                    .with_description("OS base, e.g. ubuntu@22.04; chosen by the controller when unset"),
            )
            .attribute(
                AttributeSchema::new("constraints", AttributeType::String)
                    .optional_computed()
                    .requires_replace(),
            )
            .attribute(AttributeSchema::new("machine_id", AttributeType::String).computed())
            .attribute(AttributeSchema::new("hostname", AttributeType::String).computed())
            .with_description("A machine in a model")
    }

    fn import_hint(&self) -> Option<&'static str> {
        Some("<model-UUID>:<machine-id>:<name>")
    }

    async fn read(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let key = MachineKey::parse(id, identifier)?;
        match self.client.read_machine(&key.model_uuid, &key.machine_id).await {
            Ok(machine) => Ok(state(id, &key, machine)),
            Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
            Err(e) => Err(Self::failed(id, "Failed to read machine", e)),
        }
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        self.schema()
            .validate(&resource.attributes)
            .map_err(|errors| ProviderError::validation(id.clone(), errors))?;

        let attrs = &resource.attributes;
        let input = CreateMachineInput {
            model_uuid: get_string(attrs, "model_uuid").unwrap_or_default().to_string(),
            name: get_string(attrs, "name").unwrap_or_default().to_string(),
            base: get_string(attrs, "base").map(str::to_string),
            constraints: get_string(attrs, "constraints").map(str::to_string),
        };

        info!("Adding machine {} to model {}", input.name, input.model_uuid);
        let machine_id = self
            .client
            .create_machine(&input)
            .await
            .map_err(|e| Self::failed(id, "Failed to create machine", e))?;

        let key = MachineKey {
            model_uuid: input.model_uuid,
            machine_id,
            name: input.name,
        };
        let client = self.client.clone();
        let machine = wait_for(
            WaitFor::new(
                format!("machine {}", key.machine_id),
                (key.model_uuid.clone(), key.machine_id.clone()),
                move |(model_uuid, machine_id): (String, String)| {
                    let client = client.clone();
                    async move { client.read_machine(&model_uuid, &machine_id).await }
                },
            )
            .assert(provisioned)
            .with_config(self.wait)
            .with_cancellation(self.cancel.clone()),
        )
        .await
        .map_err(|e| {
            // The machine exists even though it never started
            let partial = State::existing(
                id.clone(),
                HashMap::from([
                    ("model_uuid".to_string(), Value::String(key.model_uuid.clone())),
                    ("name".to_string(), Value::String(key.name.clone())),
                    ("machine_id".to_string(), Value::String(key.machine_id.clone())),
                ]),
            )
            .with_identifier(key.identifier());
            Self::failed(id, "Machine did not start", e).with_partial_state(partial)
        })?;

        Ok(state(id, &key, machine))
    }

    /// Every configurable attribute forces replacement, so an in-place
    /// update only refreshes state
    async fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        self.schema()
            .validate(&to.attributes)
            .map_err(|errors| ProviderError::validation(id.clone(), errors))?;
        ensure_in_place(&self.schema(), from, to)?;
        self.read(id, identifier).await
    }

    async fn delete(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let key = MachineKey::parse(id, identifier)?;

        info!("Destroying machine {} ({})", key.machine_id, key.name);
        match self.client.destroy_machine(&key.model_uuid, &key.machine_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(Self::failed(id, "Failed to destroy machine", e)),
        }

        let client = self.client.clone();
        wait_for_error(
            WaitForError::new(
                format!("removal of machine {}", key.machine_id),
                (key.model_uuid.clone(), key.machine_id.clone()),
                move |(model_uuid, machine_id): (String, String)| {
                    let client = client.clone();
                    async move { client.read_machine(&model_uuid, &machine_id).await }
                },
                ClientError::is_not_found,
            )
            .with_config(self.wait)
            .with_cancellation(self.cancel.clone()),
        )
        .await
        .map_err(|e| Self::failed(id, "Machine was not removed", e))
    }

    async fn import(&self, id: &ResourceId, import_id: &str) -> ProviderResult<State> {
        let state = self.read(id, import_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!("No machine {}", import_id)).for_resource(id.clone()));
        }
        Ok(state)
    }
}
