// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::collections::BTreeMap;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use url::Url;

use crate::{
    config::ConnectionConfig,
    error::{ApiError, ApiResult, ConnectError},
    http::HttpClient,
    request::{RequestOption, RequestOptions},
};

/// Builds a live client for a configuration bound to a single host.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to the first host of `config` and verifies that it is reachable.
    ///
    /// An unreachable host fails with [`ApiError::Connect`]; host failover only catches
    /// that variant.
    async fn connect(&self, config: &ConnectionConfig) -> ApiResult<HttpClient>;
}

/// The default connector: a `reqwest` client probed with `GET` on the base url.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    defaults: BTreeMap<String, Value>,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self {
            defaults: BTreeMap::from([("verify".to_string(), Value::Bool(true))]),
        }
    }
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: BTreeMap<String, Value>) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    /// Client options: configured options overlaid on the connector defaults.
    ///
    /// Unknown keys are skipped here; they are rejected when a request is built.
    pub fn options(&self, config: &ConnectionConfig) -> RequestOptions {
        let mut options = RequestOptions::new();
        for (key, value) in self.defaults.iter().chain(&config.options) {
            match key.parse::<RequestOption>() {
                Ok(option) => {
                    options.insert(option, value.clone());
                },
                Err(_) => debug!(option = key.as_str(); "Ignoring unknown connection option"),
            }
        }
        options
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, config: &ConnectionConfig) -> ApiResult<HttpClient> {
        let host = config
            .hosts()
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidHostSet("API hosts array is empty.".to_string()))?;
        let base_url: Url = host.parse()?;

        let client = HttpClient::with_options(base_url, config.credentials(), self.options(config), config.retries)?;

        client.probe().await.map_err(|e| ConnectError::new(host.as_str(), e))?;

        let latency_ms = client.latency().await.map(|d| d.as_millis()).unwrap_or_default();
        info!(host = host.as_str(), latency_ms = latency_ms as u64; "Host reachable");

        Ok(client)
    }
}
