// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::debug;

use crate::{
    config::{ApiConfig, ConnectionConfig},
    connection::Connection,
    connectors::ConnectionFactory,
    error::ApiResult,
    events::EventSink,
    resolver::ConnectionResolver,
};

const SUPPORTED_DRIVERS: [&str; 1] = ["http"];
const DEFAULT_DRIVER: &str = "http";

/// Builds the connection for a name or driver instead of the factory.
pub type Extension = Arc<dyn Fn(ConnectionConfig, &ConnectionFactory) -> ApiResult<Connection> + Send + Sync>;

/// Owns the named connections of an application.
///
/// Connections are built on first access and cached until purged. Building one never
/// contacts a host; that happens on its first request.
pub struct ApiManager {
    config: RwLock<ApiConfig>,
    factory: ConnectionFactory,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    extensions: RwLock<HashMap<String, Extension>>,
    events: RwLock<Option<Arc<dyn EventSink>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl ApiManager {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_factory(config, ConnectionFactory::new())
    }

    pub fn with_factory(config: ApiConfig, factory: ConnectionFactory) -> Self {
        Self {
            config: RwLock::new(config),
            factory,
            connections: RwLock::new(HashMap::new()),
            extensions: RwLock::new(HashMap::new()),
            events: RwLock::new(None),
        }
    }

    /// The cached connection for `name` (the default connection when `None`), building it
    /// on first access.
    pub fn connection(&self, name: Option<&str>) -> ApiResult<Arc<Connection>> {
        let name = name.map_or_else(|| self.default_connection(), str::to_string);
        if let Some(connection) = read(&self.connections).get(&name) {
            return Ok(connection.clone());
        }

        debug!(connection = name.as_str(); "Building connection");
        let connection = Arc::new(self.configure(self.make_connection(&name)?));
        Ok(write(&self.connections).entry(name).or_insert(connection).clone())
    }

    /// Builds a new, uncached connection for `name`.
    ///
    /// An extension registered under the connection name wins over one registered under
    /// its driver; without either the factory builds the connection.
    pub fn make_connection(&self, name: &str) -> ApiResult<Connection> {
        let config = self.configuration(name)?;

        if let Some(extension) = self.extension(name) {
            return extension(config, &self.factory);
        }
        if let Some(extension) = config.driver.as_deref().and_then(|driver| self.extension(driver)) {
            return extension(config, &self.factory);
        }
        self.factory.make(config)
    }

    fn configuration(&self, name: &str) -> ApiResult<ConnectionConfig> {
        let mut config = read(&self.config).connection(name)?;
        config.driver.get_or_insert_with(|| DEFAULT_DRIVER.to_string());
        Ok(config)
    }

    fn configure(&self, connection: Connection) -> Connection {
        if let Some(events) = self.event_sink() {
            connection.set_event_sink(events);
        }
        connection
    }

    fn extension(&self, key: &str) -> Option<Extension> {
        read(&self.extensions).get(key).cloned()
    }

    /// Drops the cached connection; the next access builds and resolves it again.
    pub fn purge(&self, name: Option<&str>) {
        let name = name.map_or_else(|| self.default_connection(), str::to_string);
        if write(&self.connections).remove(&name).is_some() {
            debug!(connection = name.as_str(); "Purged connection");
        }
    }

    /// Registers a custom builder for a connection name or a driver name.
    pub fn extend<F>(&self, name: impl Into<String>, extension: F)
    where
        F: Fn(ConnectionConfig, &ConnectionFactory) -> ApiResult<Connection> + Send + Sync + 'static,
    {
        write(&self.extensions).insert(name.into(), Arc::new(extension));
    }

    pub fn default_connection(&self) -> String {
        read(&self.config).default.clone()
    }

    pub fn set_default_connection(&self, name: impl Into<String>) {
        write(&self.config).default = name.into();
    }

    pub fn supported_drivers(&self) -> &'static [&'static str] {
        &SUPPORTED_DRIVERS
    }

    pub fn default_driver(&self) -> &'static str {
        DEFAULT_DRIVER
    }

    /// Names of the cached connections, sorted.
    pub fn connections(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.connections).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn config(&self) -> ApiConfig {
        read(&self.config).clone()
    }

    pub fn factory(&self) -> &ConnectionFactory {
        &self.factory
    }

    pub fn event_sink(&self) -> Option<Arc<dyn EventSink>> {
        read(&self.events).clone()
    }

    /// Attaches `events` to connections built from now on.
    pub fn set_event_sink(&self, events: Arc<dyn EventSink>) {
        *write(&self.events) = Some(events);
    }

    pub fn unset_event_sink(&self) {
        *write(&self.events) = None;
    }
}

impl ConnectionResolver for ApiManager {
    fn connection(&self, name: Option<&str>) -> ApiResult<Arc<Connection>> {
        ApiManager::connection(self, name)
    }

    fn default_connection(&self) -> String {
        ApiManager::default_connection(self)
    }

    fn set_default_connection(&self, name: &str) {
        ApiManager::set_default_connection(self, name)
    }
}
