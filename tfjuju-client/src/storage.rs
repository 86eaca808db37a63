//! Storage pool management interface

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ClientResult;

/// Identifies a storage pool within a model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePoolKey {
    pub model_uuid: String,
    pub name: String,
}

/// A storage pool as reported by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePool {
    pub name: String,
    /// Storage provider type, e.g. "lxd", "ebs", "tmpfs"
    pub provider: String,
    pub attributes: HashMap<String, String>,
}

/// Storage pool calls of the model API
#[async_trait]
pub trait StoragePoolClient: Send + Sync {
    async fn create_storage_pool(&self, model_uuid: &str, pool: &StoragePool) -> ClientResult<()>;

    async fn get_storage_pool(&self, key: &StoragePoolKey) -> ClientResult<StoragePool>;

    /// Replaces the pool's attributes
    async fn update_storage_pool(&self, model_uuid: &str, pool: &StoragePool) -> ClientResult<()>;

    async fn remove_storage_pool(&self, key: &StoragePoolKey) -> ClientResult<()>;
}
