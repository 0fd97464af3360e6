// Common World Definition and Utilities for Cucumber BDD Tests
//
// The shared state object (ApiWorld) and the steps that start mock API hosts.

use std::{fmt, path::PathBuf, sync::Arc};

use apilink::{
    ApiConfig, ApiError, ApiManager, ConnectionConfig, Payload,
    connection::RequestRecord,
    events::{ChannelEventSink, RequestExecuted},
};
use cucumber::{World, given};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// Closed local ports standing in for hosts that are down.
pub const DEAD_HOSTS: [&str; 2] = ["http://127.0.0.1:1", "http://127.0.0.1:2"];

// =============================
// World Definition
// =============================

#[derive(World)]
#[world(init = Self::new)]
pub struct ApiWorld {
    pub server: Option<MockServer>,
    pub config: ApiConfig,
    pub manager: Option<ApiManager>,
    pub events: Option<UnboundedReceiver<RequestExecuted>>,
    pub last_error: Option<ApiError>,
    pub last_payload: Option<Payload>,
    pub request_log: Vec<RequestRecord>,
    pub resolved_hosts: Vec<String>,
    pub temp_dir: Option<TempDir>,
    pub config_path: Option<PathBuf>,
    pub last_command_output: Option<String>,
    pub last_command_exit_code: Option<i32>,
}

impl fmt::Debug for ApiWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiWorld")
            .field("server", &self.server.as_ref().map(MockServer::uri))
            .field("config", &self.config)
            .field("last_error", &self.last_error)
            .field("last_payload", &self.last_payload)
            .field("request_log", &self.request_log)
            .field("resolved_hosts", &self.resolved_hosts)
            .finish_non_exhaustive()
    }
}

impl ApiWorld {
    pub fn new() -> Self {
        Self {
            server: None,
            config: ApiConfig::new("default"),
            manager: None,
            events: None,
            last_error: None,
            last_payload: None,
            request_log: Vec::new(),
            resolved_hosts: Vec::new(),
            temp_dir: None,
            config_path: None,
            last_command_output: None,
            last_command_exit_code: None,
        }
    }

    pub fn server_uri(&self) -> String {
        self.server.as_ref().expect("No API host started").uri()
    }

    pub fn add_connection(&mut self, name: &str, config: ConnectionConfig) {
        self.config.connections.insert(name.to_string(), config);
    }

    /// The manager for the configured connections, built on first use with an event
    /// channel attached.
    pub fn manager(&mut self) -> &ApiManager {
        if self.manager.is_none() {
            let (tx, rx) = unbounded_channel();
            let manager = ApiManager::new(self.config.clone());
            manager.set_event_sink(Arc::new(ChannelEventSink::new(tx)));
            self.events = Some(rx);
            self.manager = Some(manager);
        }
        self.manager.as_ref().expect("Manager not initialized")
    }

    pub fn drain_events(&mut self) -> Vec<RequestExecuted> {
        let mut events = Vec::new();
        if let Some(rx) = self.events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }

    pub async fn received_requests(&self) -> usize {
        let server = self.server.as_ref().expect("No API host started");
        server.received_requests().await.map(|r| r.len()).unwrap_or_default()
    }
}

// =============================
// Common Steps
// =============================

#[given("a reachable API host")]
async fn reachable_host(world: &mut ApiWorld) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    world.server = Some(server);
}

#[given("a reachable API host serving widgets")]
async fn reachable_host_with_widgets(world: &mut ApiWorld) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets"))
        .and(header("x-client", "apilink"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "gear"},
            {"id": 2, "name": "sprocket"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    world.server = Some(server);
}
