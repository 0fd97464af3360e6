// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::seq::SliceRandom;

use super::connector::{Connector, HttpConnector};
use crate::{
    config::ConnectionConfig,
    connection::{ClientState, Connection, ResolveClient},
    error::{ApiError, ApiResult, ConnectError},
    http::HttpClient,
};

/// Builds the [`Connection`] for a driver from its lazy client and configuration.
pub type ConnectionBuilderFn = Arc<dyn Fn(ClientState, ConnectionConfig) -> Connection + Send + Sync>;

/// Per-driver connection builders consulted by [`ConnectionFactory::make`].
#[derive(Default)]
pub struct ConnectionResolvers {
    builders: RwLock<HashMap<String, ConnectionBuilderFn>>,
}

impl ConnectionResolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, driver: impl Into<String>, builder: ConnectionBuilderFn) {
        self.builders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(driver.into(), builder);
    }

    pub fn get(&self, driver: &str) -> Option<ConnectionBuilderFn> {
        self.builders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(driver)
            .cloned()
    }
}

/// Turns connection configurations into connections with a lazily resolved client.
pub struct ConnectionFactory {
    connectors: RwLock<HashMap<String, Arc<dyn Connector>>>,
    default_connector: Arc<dyn Connector>,
    resolvers: ConnectionResolvers,
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFactory {
    pub fn new() -> Self {
        Self::with_default_connector(Arc::new(HttpConnector::new()))
    }

    pub fn with_default_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connectors: RwLock::new(HashMap::new()),
            default_connector: connector,
            resolvers: ConnectionResolvers::new(),
        }
    }

    /// Uses `connector` for every configuration with the given driver.
    pub fn register_connector(&self, driver: impl Into<String>, connector: Arc<dyn Connector>) {
        self.connectors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(driver.into(), connector);
    }

    /// Builds connections of the given driver with `builder` instead of [`Connection::new`].
    pub fn resolver_for<F>(&self, driver: impl Into<String>, builder: F)
    where
        F: Fn(ClientState, ConnectionConfig) -> Connection + Send + Sync + 'static,
    {
        self.resolvers.register(driver, Arc::new(builder));
    }

    pub fn resolvers(&self) -> &ConnectionResolvers {
        &self.resolvers
    }

    /// Wraps `config` in a connection whose client is resolved on first use.
    ///
    /// Nothing is contacted here. The first request tries the configured hosts in random
    /// order and keeps the first one that connects.
    pub fn make(&self, config: ConnectionConfig) -> ApiResult<Connection> {
        let connector = self.create_connector(&config)?;
        let client = ClientState::Unresolved(Arc::new(HostFailover::new(connector, config.clone())));

        if let Some(builder) = config.driver.as_deref().and_then(|driver| self.resolvers.get(driver)) {
            return Ok(builder(client, config));
        }
        Ok(Connection::new(client, config))
    }

    pub fn create_connector(&self, config: &ConnectionConfig) -> ApiResult<Arc<dyn Connector>> {
        let driver = config
            .driver
            .as_deref()
            .ok_or_else(|| ApiError::InvalidHostSet("A driver must be specified.".to_string()))?;

        let registered = self
            .connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(driver)
            .cloned();
        Ok(registered.unwrap_or_else(|| self.default_connector.clone()))
    }
}

/// Resolves a client by trying each configured host, in random order, until one connects.
pub struct HostFailover {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
}

impl HostFailover {
    pub fn new(connector: Arc<dyn Connector>, config: ConnectionConfig) -> Self {
        Self { connector, config }
    }

    fn shuffled_hosts(&self) -> ApiResult<Vec<String>> {
        let mut hosts = self.config.hosts();
        if hosts.is_empty() {
            return Err(ApiError::InvalidHostSet("API hosts array is empty.".to_string()));
        }
        hosts.shuffle(&mut rand::thread_rng());
        Ok(hosts)
    }
}

#[async_trait]
impl ResolveClient for HostFailover {
    async fn resolve(&self) -> ApiResult<HttpClient> {
        let hosts = self.shuffled_hosts()?;
        let name = self.config.name.clone().unwrap_or_default();

        let mut last_error: Option<ConnectError> = None;
        for host in hosts {
            debug!(connection = name.as_str(), host = host.as_str(); "Trying host");
            match self.connector.connect(&self.config.for_host(&host)).await {
                Ok(client) => {
                    info!(connection = name.as_str(), host = host.as_str(); "Connected");
                    return Ok(client);
                },
                Err(ApiError::Connect(e)) => {
                    warn!(connection = name.as_str(), host = host.as_str(), error:% = e.cause(); "Host unreachable");
                    last_error = Some(e);
                },
                Err(e) => return Err(e),
            }
        }

        Err(match last_error {
            Some(e) => e.into(),
            None => ApiError::InvalidHostSet("API hosts array is empty.".to_string()),
        })
    }
}
