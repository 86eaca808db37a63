//! Machine management interface

use async_trait::async_trait;

use crate::error::ClientResult;

/// Machine status reported before the machine has been provisioned
pub const STATUS_PENDING: &str = "pending";

/// Parameters for adding a machine to a model
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateMachineInput {
    pub model_uuid: String,
    /// Display name, only tracked by the provider
    pub name: String,
    /// OS base, e.g. "ubuntu@22.04"
    pub base: Option<String>,
    /// Constraints string, e.g. "cores=2 mem=4G"
    pub constraints: Option<String>,
}

/// A machine as reported by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub machine_id: String,
    pub base: String,
    pub constraints: String,
    pub status: String,
    pub hostname: Option<String>,
}

/// Machine calls of the model API
#[async_trait]
pub trait MachineClient: Send + Sync {
    /// Returns the id the controller assigned to the new machine
    async fn create_machine(&self, input: &CreateMachineInput) -> ClientResult<String>;

    async fn read_machine(&self, model_uuid: &str, machine_id: &str) -> ClientResult<Machine>;

    async fn destroy_machine(&self, model_uuid: &str, machine_id: &str) -> ClientResult<()>;
}
