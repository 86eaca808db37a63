//! tfjuju Client
//!
//! Interfaces to the Juju controller and its JAAS access-control extension,
//! as consumed by the provider.
//!
//! ## Module Structure
//!
//! - `tag` - Kind-prefixed identifiers and their validity predicates
//! - `access` - Relationship tuples and the `AccessClient` trait
//! - `storage` - The `StoragePoolClient` trait
//! - `machine` - The `MachineClient` trait
//! - `config` - Controller connection configuration
//! - `error` - `ClientError`

pub mod access;
pub mod config;
pub mod error;
pub mod machine;
pub mod storage;
pub mod tag;

// Re-export main types
pub use access::{
    AccessClient, AccessRequest, PrincipalKind, RelationshipTuple, TupleFilter, TuplePage,
};
pub use config::{ConfigError, ControllerConfig, Credentials};
pub use error::{ClientError, ClientResult};
pub use machine::{CreateMachineInput, Machine, MachineClient};
pub use storage::{StoragePool, StoragePoolClient, StoragePoolKey};
pub use tag::{Tag, TagError, TagKind};
