// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    connection::Connection,
    error::{ApiError, ApiResult},
};

/// Looks up connections by name.
pub trait ConnectionResolver: Send + Sync {
    /// The connection called `name`, or the default connection when `None`.
    fn connection(&self, name: Option<&str>) -> ApiResult<Arc<Connection>>;

    fn default_connection(&self) -> String;

    fn set_default_connection(&self, name: &str);
}

/// A fixed set of prebuilt connections.
pub struct StaticConnectionResolver {
    connections: HashMap<String, Arc<Connection>>,
    default: RwLock<String>,
}

impl StaticConnectionResolver {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            connections: HashMap::new(),
            default: RwLock::new(default.into()),
        }
    }

    pub fn with_connection(mut self, name: impl Into<String>, connection: Arc<Connection>) -> Self {
        self.connections.insert(name.into(), connection);
        self
    }

    pub fn has_connection(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }
}

impl ConnectionResolver for StaticConnectionResolver {
    fn connection(&self, name: Option<&str>) -> ApiResult<Arc<Connection>> {
        let name = name.map_or_else(|| self.default_connection(), str::to_string);
        self.connections
            .get(&name)
            .cloned()
            .ok_or(ApiError::UnconfiguredConnection { name })
    }

    fn default_connection(&self) -> String {
        self.default.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_default_connection(&self, name: &str) {
        *self.default.write().unwrap_or_else(PoisonError::into_inner) = name.to_string();
    }
}
