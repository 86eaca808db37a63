//! Controller connection configuration
//!
//! Built from the provider block, with environment variables filling in
//! whatever the block leaves unset.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tfjuju_core::resource::Value;
use tfjuju_core::wait::WaitConfig;

pub const ENV_CONTROLLER_ADDRESSES: &str = "JUJU_CONTROLLER_ADDRESSES";
pub const ENV_USERNAME: &str = "JUJU_USERNAME";
pub const ENV_PASSWORD: &str = "JUJU_PASSWORD";
pub const ENV_CA_CERT: &str = "JUJU_CA_CERT";
pub const ENV_CLIENT_ID: &str = "JUJU_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "JUJU_CLIENT_SECRET";

/// Errors in the provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no controller addresses configured (set controller_addresses or JUJU_CONTROLLER_ADDRESSES)")]
    MissingAddresses,

    #[error("no credentials configured: set username/password or client_id/client_secret")]
    MissingCredentials,

    #[error("username/password and client_id/client_secret are mutually exclusive")]
    ConflictingCredentials,

    #[error("{0} is set without its counterpart")]
    IncompleteCredentials(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the provider authenticates to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    UserPassword { username: String, password: String },
    ClientCredentials { client_id: String, client_secret: String },
}

/// Connection settings for a controller (or JAAS)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub controller_addresses: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// PEM encoded CA certificate of the controller
    pub ca_certificate: Option<String>,
    /// Override of the convergence wait timeout, in seconds
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,
    /// Override of the convergence poll interval, in seconds
    #[serde(default)]
    pub wait_interval_secs: Option<u64>,
}

impl ControllerConfig {
    /// Build from provider block attributes, falling back to the process environment
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> ConfigResult<Self> {
        Self::from_sources(attributes, |key| std::env::var(key).ok())
    }

    /// Build from provider block attributes, falling back to `env`
    pub fn from_sources(
        attributes: &HashMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let lookup = |key: &str, env_key: &str| -> Option<String> {
            get_string(attributes, key)
                .map(str::to_string)
                .or_else(|| env(env_key))
                .filter(|s| !s.is_empty())
        };

        let controller_addresses = split_addresses(attributes, env(ENV_CONTROLLER_ADDRESSES));

        let config = Self {
            controller_addresses,
            username: lookup("username", ENV_USERNAME),
            password: lookup("password", ENV_PASSWORD),
            client_id: lookup("client_id", ENV_CLIENT_ID),
            client_secret: lookup("client_secret", ENV_CLIENT_SECRET),
            ca_certificate: lookup("ca_certificate", ENV_CA_CERT),
            wait_timeout_secs: get_seconds(attributes, "wait_timeout")?,
            wait_interval_secs: get_seconds(attributes, "wait_interval")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check addresses are present and exactly one complete credential pair is set
    pub fn validate(&self) -> ConfigResult<()> {
        if self.controller_addresses.is_empty() {
            return Err(ConfigError::MissingAddresses);
        }
        self.credentials().map(|_| ())
    }

    pub fn credentials(&self) -> ConfigResult<Credentials> {
        let user_pair = pair(&self.username, &self.password, "username", "password")?;
        let client_pair = pair(&self.client_id, &self.client_secret, "client_id", "client_secret")?;

        match (user_pair, client_pair) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingCredentials),
            (Some((username, password)), None) => Ok(Credentials::UserPassword { username, password }),
            (None, Some((client_id, client_secret))) => Ok(Credentials::ClientCredentials {
                client_id,
                client_secret,
            }),
            (None, None) => Err(ConfigError::MissingCredentials),
        }
    }

    /// Waiter timing, with defaults for anything not overridden
    pub fn wait_config(&self) -> WaitConfig {
        let mut config = WaitConfig::default();
        if let Some(secs) = self.wait_timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.wait_interval_secs {
            config.interval = Duration::from_secs(secs);
        }
        config
    }
}

fn pair(
    first: &Option<String>,
    second: &Option<String>,
    first_name: &str,
    second_name: &str,
) -> ConfigResult<Option<(String, String)>> {
    match (first, second) {
        (Some(a), Some(b)) => Ok(Some((a.clone(), b.clone()))),
        (Some(_), None) => Err(ConfigError::IncompleteCredentials(first_name.to_string())),
        (None, Some(_)) => Err(ConfigError::IncompleteCredentials(second_name.to_string())),
        (None, None) => Ok(None),
    }
}

fn get_string<'a>(attributes: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(Value::as_str)
}

/// Addresses may be given as a list or as one comma separated string
fn split_addresses(attributes: &HashMap<String, Value>, fallback: Option<String>) -> Vec<String> {
    let joined = match attributes.get("controller_addresses") {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => fallback.unwrap_or_default(),
    };
    joined
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

fn get_seconds(attributes: &HashMap<String, Value>, key: &str) -> ConfigResult<Option<u64>> {
    match attributes.get(key) {
        None => Ok(None),
        Some(Value::Int(n)) if *n > 0 => Ok(Some(*n as u64)),
        Some(_) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be a positive number of seconds".to_string(),
        }),
    }
}
