// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

//! Named connection configuration.
//!
//! Configuration is stored leniently: option keys are kept as plain strings and only
//! validated when a request is built from them.

mod loader;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use loader::{get_default_config, load_configuration, write_config_to};

use crate::{
    error::{ApiError, ApiResult},
    http::Credentials,
};

/// One host or an ordered list of candidate hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostList {
    One(String),
    Many(Vec<String>),
}

impl HostList {
    /// The candidate hosts in configured order, skipping blank entries.
    pub fn to_vec(&self) -> Vec<String> {
        let hosts = match self {
            HostList::One(host) => vec![host.clone()],
            HostList::Many(hosts) => hosts.clone(),
        };
        hosts.into_iter().filter(|h| !h.trim().is_empty()).collect()
    }
}

impl Default for HostList {
    fn default() -> Self {
        HostList::Many(Vec::new())
    }
}

impl From<&str> for HostList {
    fn from(host: &str) -> Self {
        HostList::One(host.to_string())
    }
}

impl From<String> for HostList {
    fn from(host: String) -> Self {
        HostList::One(host)
    }
}

impl From<Vec<String>> for HostList {
    fn from(hosts: Vec<String>) -> Self {
        HostList::Many(hosts)
    }
}

impl<const N: usize> From<[&str; N]> for HostList {
    fn from(hosts: [&str; N]) -> Self {
        HostList::Many(hosts.iter().map(|h| h.to_string()).collect())
    }
}

/// Configuration of a single named connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub host: HostList,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Default request options, keyed by option name.
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
    #[serde(default)]
    pub name: Option<String>,
    /// Retries of transient transport failures (exponential backoff); 0 disables.
    #[serde(default)]
    pub retries: u32,
}

impl ConnectionConfig {
    pub fn new(driver: impl Into<String>, host: impl Into<HostList>) -> Self {
        Self {
            driver: Some(driver.into()),
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// A copy of this configuration bound to a single host.
    pub fn for_host(&self, host: &str) -> Self {
        Self {
            host: HostList::One(host.to_string()),
            ..self.clone()
        }
    }

    pub fn hosts(&self) -> Vec<String> {
        self.host.to_vec()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone(),
        })
    }
}

/// The full set of named connections plus the default connection name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_connection_name")]
    pub default: String,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

fn default_connection_name() -> String {
    "default".to_string()
}

impl ApiConfig {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            connections: BTreeMap::new(),
        }
    }

    pub fn with_connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.connections.insert(name.into(), config);
        self
    }

    /// Loads the configuration file at `path`; see [`load_configuration`].
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        load_configuration(path)
    }

    /// Configuration for `name`, with `name` filled in when the entry does not set one.
    pub fn connection(&self, name: &str) -> ApiResult<ConnectionConfig> {
        let mut config = self
            .connections
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::UnconfiguredConnection { name: name.to_string() })?;
        config.name.get_or_insert_with(|| name.to_string());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn host_list_accepts_string_or_list() {
        let one: ConnectionConfig = serde_json::from_value(json!({"host": "https://a.test"})).unwrap();
        assert_eq!(one.hosts(), vec!["https://a.test"]);

        let many: ConnectionConfig =
            serde_json::from_value(json!({"host": ["https://a.test", " ", "https://b.test"]})).unwrap();
        assert_eq!(many.hosts(), vec!["https://a.test", "https://b.test"]);

        let none = ConnectionConfig::default();
        assert!(none.hosts().is_empty());
    }

    #[test]
    fn connection_fills_in_name() {
        let config = ApiConfig::new("billing")
            .with_connection("billing", ConnectionConfig::new("http", "https://billing.test"))
            .with_connection(
                "search",
                ConnectionConfig::new("http", "https://search.test").with_name("search-eu"),
            );

        assert_eq!(config.connection("billing").unwrap().name.as_deref(), Some("billing"));
        assert_eq!(config.connection("search").unwrap().name.as_deref(), Some("search-eu"));
        assert!(matches!(
            config.connection("missing"),
            Err(ApiError::UnconfiguredConnection { name }) if name == "missing"
        ));
    }

    #[test]
    fn credentials_need_a_username() {
        let config = ConnectionConfig::new("http", "https://a.test");
        assert!(config.credentials().is_none());

        let config = config.with_credentials("svc", "hunter2");
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.username, "svc");
        assert_eq!(credentials.password.as_deref(), Some("hunter2"));
    }
}
