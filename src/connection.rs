// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

//! A configured binding to one API target.
//!
//! A [`Connection`] owns a lazily resolved [`HttpClient`], the connection configuration,
//! the post processor handed to new builders, and an in-memory log of executed requests.
//!
//! # Execution pipeline
//!
//! [`RequestBuilder::send`] calls [`Connection::send`], which times the transport call,
//! wraps any failure into a [`RequestError`] and hands it to the [`ErrorHandler`]. The
//! request is logged only when a response is produced: a handler that re-raises (the
//! default, [`Propagate`]) leaves no log entry and emits no event.
//!
//! # Pretending
//!
//! Inside [`Connection::pretend`] requests are recorded but never sent, and the client is
//! not resolved. The scope saves and restores a single flag, so it must not be nested.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Method;
use serde_json::Value;

use crate::{
    config::ConnectionConfig,
    error::{ApiError, ApiResult, RequestError},
    events::{EventSink, Listener, RequestExecuted},
    http::{HttpClient, Response},
    request::{DefaultProcessor, Macro, Processor, RequestBuilder, RequestOptions},
};

/// Produces the live client of a connection on first use.
#[async_trait]
pub trait ResolveClient: Send + Sync {
    async fn resolve(&self) -> ApiResult<HttpClient>;
}

/// The client handle of a connection: resolved once, then memoized.
pub enum ClientState {
    Unresolved(Arc<dyn ResolveClient>),
    Resolved(Arc<HttpClient>),
}

/// Decides what happens when a request fails.
///
/// Returning a response recovers from the failure (the request is then logged as
/// usual); returning an error propagates it to the caller.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle(
        &self,
        connection: &Connection,
        url: &str,
        options: &RequestOptions,
        method: &Method,
        error: RequestError,
    ) -> ApiResult<Response>;
}

/// Re-raises every failure unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Propagate;

#[async_trait]
impl ErrorHandler for Propagate {
    async fn handle(
        &self,
        _connection: &Connection,
        _url: &str,
        _options: &RequestOptions,
        _method: &Method,
        error: RequestError,
    ) -> ApiResult<Response> {
        Err(error.into())
    }
}

/// An entry of the request log.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub url: String,
    pub options: RequestOptions,
    pub method: Method,
    pub elapsed_ms: f64,
}

pub struct Connection {
    client: tokio::sync::Mutex<ClientState>,
    config: RwLock<ConnectionConfig>,
    processor: RwLock<Arc<dyn Processor>>,
    events: RwLock<Option<Arc<dyn EventSink>>>,
    error_handler: RwLock<Arc<dyn ErrorHandler>>,
    macros: RwLock<HashMap<String, Macro>>,
    request_log: Mutex<Vec<RequestRecord>>,
    logging_requests: AtomicBool,
    pretending: AtomicBool,
}

fn read<T: ?Sized>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T: ?Sized>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

impl Connection {
    pub fn new(client: ClientState, config: ConnectionConfig) -> Self {
        Self {
            client: tokio::sync::Mutex::new(client),
            config: RwLock::new(config),
            processor: RwLock::new(Arc::new(DefaultProcessor)),
            events: RwLock::new(None),
            error_handler: RwLock::new(Arc::new(Propagate)),
            macros: RwLock::new(HashMap::new()),
            request_log: Mutex::new(Vec::new()),
            logging_requests: AtomicBool::new(false),
            pretending: AtomicBool::new(false),
        }
    }

    // ----- builders -----

    /// A builder with the configured default options applied.
    ///
    /// Fails with [`ApiError::UnsupportedOption`] if the configuration names an unknown
    /// option.
    pub fn request(&self) -> ApiResult<RequestBuilder<'_>> {
        let options = read(&self.config).options.clone();
        let mut builder = self.new_request_without_options();
        builder.set_options(options)?;
        Ok(builder)
    }

    pub fn new_request_without_options(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Some(self.post_processor()))
    }

    // ----- sending -----

    pub async fn get(&self, url: &str, options: &RequestOptions) -> ApiResult<Response> {
        self.send(url, options, Method::GET).await
    }

    pub async fn post(&self, url: &str, options: &RequestOptions) -> ApiResult<Response> {
        self.send(url, options, Method::POST).await
    }

    pub async fn put(&self, url: &str, options: &RequestOptions) -> ApiResult<Response> {
        self.send(url, options, Method::PUT).await
    }

    pub async fn patch(&self, url: &str, options: &RequestOptions) -> ApiResult<Response> {
        self.send(url, options, Method::PATCH).await
    }

    pub async fn delete(&self, url: &str, options: &RequestOptions) -> ApiResult<Response> {
        self.send(url, options, Method::DELETE).await
    }

    /// Sends a request through the execution pipeline.
    pub async fn send(&self, url: &str, options: &RequestOptions, method: Method) -> ApiResult<Response> {
        self.run(url, options, &method, || self.dispatch(url, options, method.clone()))
            .await
    }

    /// The raw send step: a canned empty response while pretending, the transport otherwise.
    pub async fn dispatch(&self, url: &str, options: &RequestOptions, method: Method) -> ApiResult<Response> {
        if self.pretending() {
            return Ok(Response::empty());
        }

        let client = self.client().await?;
        client.request(method, url, options).await
    }

    async fn run<F, Fut>(&self, url: &str, options: &RequestOptions, method: &Method, callback: F) -> ApiResult<Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<Response>>,
    {
        let start = Instant::now();

        let response = match callback().await {
            Ok(response) => response,
            Err(error) => {
                let error = match error {
                    ApiError::Request(error) => error,
                    cause => RequestError::new(url, options.clone(), method.clone(), cause),
                };
                warn!(
                    connection:% = self.name().unwrap_or_default(),
                    method = method.as_str(),
                    url = url,
                    error:% = error.cause();
                    "Request failed"
                );

                let handler = read(&self.error_handler).clone();
                handler.handle(self, url, options, method, error).await?
            },
        };

        self.log_request(url, options, method, elapsed_ms(start));
        Ok(response)
    }

    /// Notifies the event sink, and appends to the request log when logging is on.
    pub fn log_request(&self, url: &str, options: &RequestOptions, method: &Method, elapsed_ms: f64) {
        debug!(
            connection:% = self.name().unwrap_or_default(),
            method = method.as_str(),
            url = url,
            elapsed_ms = elapsed_ms;
            "Request executed"
        );

        if let Some(events) = self.event_sink() {
            events.send(RequestExecuted {
                url: url.to_string(),
                options: options.clone(),
                method: method.clone(),
                elapsed_ms,
                connection_name: self.name(),
            });
        }

        if self.logging() {
            self.log().push(RequestRecord {
                url: url.to_string(),
                options: options.clone(),
                method: method.clone(),
                elapsed_ms,
            });
        }
    }

    /// Runs `callback` with sending disabled and returns the requests it made.
    ///
    /// Not reentrant: a nested scope restores the logging flag it saw on entry, which
    /// disables logging for the rest of the outer scope.
    pub async fn pretend<F>(&self, callback: F) -> ApiResult<Vec<RequestRecord>>
    where
        F: AsyncFnOnce(&Connection) -> ApiResult<()>,
    {
        let logging = self.logging();
        self.enable_request_log();
        self.flush_request_log();
        self.pretending.store(true, Ordering::SeqCst);
        debug!(connection:% = self.name().unwrap_or_default(); "Entering pretend scope");

        let result = callback(self).await;

        self.pretending.store(false, Ordering::SeqCst);
        let records = self.request_log();
        self.logging_requests.store(logging, Ordering::SeqCst);
        debug!(
            connection:% = self.name().unwrap_or_default(),
            recorded = records.len();
            "Leaving pretend scope"
        );

        result.map(|()| records)
    }

    // ----- client -----

    /// The live client, resolving it on first use.
    ///
    /// A failed resolution leaves the connection unresolved, so the next call tries again.
    pub async fn client(&self) -> ApiResult<Arc<HttpClient>> {
        let mut state = self.client.lock().await;
        let resolver = match &*state {
            ClientState::Resolved(client) => return Ok(client.clone()),
            ClientState::Unresolved(resolver) => resolver.clone(),
        };

        let client = Arc::new(resolver.resolve().await?);
        *state = ClientState::Resolved(client.clone());
        Ok(client)
    }

    pub async fn set_client(&self, client: ClientState) {
        *self.client.lock().await = client;
    }

    pub async fn is_resolved(&self) -> bool {
        matches!(*self.client.lock().await, ClientState::Resolved(_))
    }

    // ----- configuration -----

    pub fn config(&self) -> ConnectionConfig {
        read(&self.config).clone()
    }

    pub fn name(&self) -> Option<String> {
        read(&self.config).name.clone()
    }

    pub fn driver_name(&self) -> Option<String> {
        read(&self.config).driver.clone()
    }

    pub fn set_config_option(&self, update: impl FnOnce(&mut ConnectionConfig)) {
        update(&mut write(&self.config));
    }

    /// Adds a default option applied to builders from [`Connection::request`].
    pub fn add_default_option(&self, key: impl Into<String>, value: Value) {
        write(&self.config).options.insert(key.into(), value);
    }

    pub fn post_processor(&self) -> Arc<dyn Processor> {
        read(&self.processor).clone()
    }

    pub fn set_post_processor(&self, processor: Arc<dyn Processor>) {
        *write(&self.processor) = processor;
    }

    pub fn use_default_post_processor(&self) {
        self.set_post_processor(Arc::new(DefaultProcessor));
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *write(&self.error_handler) = handler;
    }

    // ----- events -----

    pub fn event_sink(&self) -> Option<Arc<dyn EventSink>> {
        read(&self.events).clone()
    }

    pub fn set_event_sink(&self, events: Arc<dyn EventSink>) {
        *write(&self.events) = Some(events);
    }

    pub fn unset_event_sink(&self) {
        *write(&self.events) = None;
    }

    /// Registers a listener on the event sink. Returns `false` without a capable sink.
    pub fn listen(&self, listener: Listener) -> bool {
        self.event_sink().is_some_and(|events| events.listen(listener))
    }

    // ----- macros -----

    pub fn register_macro<F>(&self, name: impl Into<String>, operation: F)
    where
        F: Fn(&mut RequestBuilder<'_>, Value) -> ApiResult<()> + Send + Sync + 'static,
    {
        write(&self.macros).insert(name.into(), Arc::new(operation));
    }

    pub fn has_macro(&self, name: &str) -> bool {
        read(&self.macros).contains_key(name)
    }

    pub fn macro_named(&self, name: &str) -> Option<Macro> {
        read(&self.macros).get(name).cloned()
    }

    // ----- request log -----

    fn log(&self) -> MutexGuard<'_, Vec<RequestRecord>> {
        self.request_log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request_log(&self) -> Vec<RequestRecord> {
        self.log().clone()
    }

    pub fn flush_request_log(&self) {
        self.log().clear();
    }

    pub fn enable_request_log(&self) {
        self.logging_requests.store(true, Ordering::SeqCst);
    }

    pub fn disable_request_log(&self) {
        self.logging_requests.store(false, Ordering::SeqCst);
    }

    pub fn logging(&self) -> bool {
        self.logging_requests.load(Ordering::SeqCst)
    }

    pub fn pretending(&self) -> bool {
        self.pretending.load(Ordering::SeqCst)
    }
}
