//! tfjuju Core
//!
//! Core library of the Juju infrastructure provider: declared values and
//! persisted state, schema validation, plan diffing, the provider trait,
//! and waiting for the controller to converge after a change.

pub mod differ;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod wait;
