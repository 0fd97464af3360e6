// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{fmt, sync::Arc};

use log::debug;
use reqwest::{Method, header::HeaderMap};
use serde_json::{Value, json};

use super::{
    Hook, OptionValue, Payload, Processor, Removal, RequestOption, RequestOptions,
    processor::DefaultProcessor,
};
use crate::{
    connection::Connection,
    error::{ApiError, ApiResult},
    http::{Response, TransferStats},
};

/// A named, reusable builder operation registered on a [`Connection`].
pub type Macro = Arc<dyn Fn(&mut RequestBuilder<'_>, Value) -> ApiResult<()> + Send + Sync>;

/// Builder fields that [`RequestBuilder::clone_without`] can reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderField {
    Endpoint,
    Path,
    Method,
    Options,
}

/// Accumulates the target, method and options of one request.
///
/// Option keys given as strings are validated against [`RequestOption`]; a failed
/// mutation leaves the builder untouched.
#[derive(Clone)]
pub struct RequestBuilder<'a> {
    connection: &'a Connection,
    processor: Arc<dyn Processor>,
    endpoint: String,
    path: Option<String>,
    method: Method,
    options: RequestOptions,
}

impl fmt::Debug for RequestBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("connection", &self.connection.name())
            .field("endpoint", &self.endpoint)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("options", &self.options)
            .finish()
    }
}

impl<'a> RequestBuilder<'a> {
    pub fn new(connection: &'a Connection, processor: Option<Arc<dyn Processor>>) -> Self {
        Self {
            connection,
            processor: processor.unwrap_or_else(|| Arc::new(DefaultProcessor)),
            endpoint: "/".to_string(),
            path: None,
            method: Method::GET,
            options: RequestOptions::new(),
        }
    }

    /// A fresh builder on the same connection and processor.
    pub fn new_request(&self) -> Self {
        Self::new(self.connection, Some(self.processor.clone()))
    }

    pub fn endpoint(&mut self, endpoint: impl Into<String>) -> &mut Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn get_endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    pub fn get_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Targets an absolute url: sets the endpoint and clears the path.
    pub fn url(&mut self, url: impl Into<String>) -> &mut Self {
        self.endpoint = url.into();
        self.path = None;
        self
    }

    /// The endpoint joined with the path by exactly one slash.
    pub fn get_url(&self) -> String {
        let path = self.path.as_deref().unwrap_or_default();
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    pub fn get_method(&self) -> &Method {
        &self.method
    }

    pub fn get_connection(&self) -> &'a Connection {
        self.connection
    }

    pub fn get_processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    pub fn processor(&mut self, processor: Arc<dyn Processor>) -> &mut Self {
        self.processor = processor;
        self
    }

    // ----- execution -----

    pub async fn get(&mut self, data: Option<Value>) -> ApiResult<Payload> {
        self.execute(Method::GET, data).await
    }

    pub async fn post(&mut self, data: Option<Value>) -> ApiResult<Payload> {
        self.execute(Method::POST, data).await
    }

    pub async fn put(&mut self, data: Option<Value>) -> ApiResult<Payload> {
        self.execute(Method::PUT, data).await
    }

    pub async fn patch(&mut self, data: Option<Value>) -> ApiResult<Payload> {
        self.execute(Method::PATCH, data).await
    }

    pub async fn delete(&mut self, data: Option<Value>) -> ApiResult<Payload> {
        self.execute(Method::DELETE, data).await
    }

    /// Sets the method, stores `data` as the form body when given, and runs the request.
    pub async fn execute(&mut self, method: Method, data: Option<Value>) -> ApiResult<Payload> {
        self.method = method;
        if let Some(data) = data {
            self.options.insert(RequestOption::FormParams, data);
        }
        self.run().await
    }

    /// Sends the request and hands the response to the processor.
    pub async fn run(&self) -> ApiResult<Payload> {
        let response = self.send().await?;
        self.processor.process(self, response)
    }

    /// Sends the request through the connection, returning the raw response.
    pub async fn send(&self) -> ApiResult<Response> {
        self.connection
            .send(&self.get_url(), &self.options, self.method.clone())
            .await
    }

    // ----- generic option access -----

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// The stored value of an option; unknown keys simply have no value.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        key.parse::<RequestOption>()
            .ok()
            .and_then(|option| self.options.get(option))
    }

    pub fn set_option(&mut self, key: &str, value: impl Into<OptionValue>) -> ApiResult<&mut Self> {
        let option = key.parse::<RequestOption>()?;
        self.options.insert(option, value);
        Ok(self)
    }

    /// Replaces every option. The whole map is validated before anything changes.
    pub fn set_options<I, K, V>(&mut self, options: I) -> ApiResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        self.options = RequestOptions::from_map(options)?;
        Ok(self)
    }

    /// Merges mappings key-wise, otherwise appends to the option's list of values.
    pub fn add_option(&mut self, key: &str, value: impl Into<OptionValue>) -> ApiResult<&mut Self> {
        let option = key.parse::<RequestOption>()?;
        self.options.merge(option, value)?;
        Ok(self)
    }

    pub fn remove_option(&mut self, key: &str, removal: impl Into<Removal>) -> ApiResult<&mut Self> {
        let option = key.parse::<RequestOption>()?;
        self.options.remove(option, &removal.into())?;
        Ok(self)
    }

    // ----- derivation -----

    /// A copy with the given fields reset to their defaults.
    pub fn clone_without(&self, fields: &[BuilderField]) -> Self {
        let mut clone = self.clone();
        for field in fields {
            match field {
                BuilderField::Endpoint => clone.endpoint = "/".to_string(),
                BuilderField::Path => clone.path = None,
                BuilderField::Method => clone.method = Method::GET,
                BuilderField::Options => clone.options = RequestOptions::new(),
            }
        }
        clone
    }

    /// A copy without the named options.
    pub fn clone_without_options(&self, keys: &[&str]) -> ApiResult<Self> {
        let options = keys
            .iter()
            .map(|key| key.parse::<RequestOption>())
            .collect::<ApiResult<Vec<_>>>()?;

        let mut clone = self.clone();
        for option in options {
            clone.options.take(option);
        }
        Ok(clone)
    }

    pub fn dump(&mut self) -> &mut Self {
        debug!(
            method = self.method.as_str(),
            url:% = self.get_url(),
            options:% = self.options.to_json();
            "Request builder state"
        );
        self
    }

    /// Runs a macro registered on the connection against this builder.
    pub fn invoke(&mut self, name: &str, args: Value) -> ApiResult<&mut Self> {
        let operation = self
            .connection
            .macro_named(name)
            .ok_or_else(|| ApiError::UnknownMacro { name: name.to_string() })?;
        operation(self, args)?;
        Ok(self)
    }

    // ----- typed option setters -----

    pub fn allow_redirects(&mut self, value: impl Into<Value>) -> &mut Self {
        self.options.insert(RequestOption::AllowRedirects, value.into());
        self
    }

    /// Basic authentication with the given credentials.
    pub fn authenticate(&mut self, username: &str, password: &str) -> &mut Self {
        self.options.insert(RequestOption::Auth, json!([username, password]));
        self
    }

    /// Raw `auth` value: `[user, pass]`, `[user, pass, "basic"]`, or `null` to disable.
    pub fn auth(&mut self, value: Value) -> &mut Self {
        self.options.insert(RequestOption::Auth, value);
        self
    }

    pub fn body(&mut self, body: impl Into<String>) -> &mut Self {
        self.options.insert(RequestOption::Body, body.into());
        self
    }

    pub fn cert(&mut self, value: impl Into<Value>) -> &mut Self {
        self.options.insert(RequestOption::Cert, value.into());
        self
    }

    pub fn cookies(&mut self, enabled: bool) -> &mut Self {
        self.options.insert(RequestOption::Cookies, enabled);
        self
    }

    pub fn connect_timeout(&mut self, seconds: f64) -> &mut Self {
        self.options.insert(RequestOption::ConnectTimeout, seconds);
        self
    }

    pub fn debug(&mut self, enabled: bool) -> &mut Self {
        self.options.insert(RequestOption::Debug, enabled);
        self
    }

    pub fn decode_content(&mut self, value: impl Into<Value>) -> &mut Self {
        self.options.insert(RequestOption::DecodeContent, value.into());
        self
    }

    pub fn delay(&mut self, millis: u64) -> &mut Self {
        self.options.insert(RequestOption::Delay, millis);
        self
    }

    pub fn expect(&mut self, value: impl Into<Value>) -> &mut Self {
        self.options.insert(RequestOption::Expect, value.into());
        self
    }

    /// Pins name resolution to `"v4"` or `"v6"`.
    pub fn force_ip_resolve(&mut self, version: &str) -> &mut Self {
        self.options.insert(RequestOption::ForceIpResolve, version);
        self
    }

    pub fn parameters(&mut self, parameters: Value) -> &mut Self {
        self.options.insert(RequestOption::FormParams, parameters);
        self
    }

    pub fn add_parameter(&mut self, key: &str, value: impl Into<Value>) -> ApiResult<&mut Self> {
        let value: Value = value.into();
        self.options.merge(RequestOption::FormParams, json!({ key: value }))?;
        Ok(self)
    }

    pub fn remove_parameter(&mut self, key: &str) -> ApiResult<&mut Self> {
        self.options.remove(RequestOption::FormParams, &Removal::from(key))?;
        Ok(self)
    }

    pub fn headers(&mut self, headers: Value) -> &mut Self {
        self.options.insert(RequestOption::Headers, headers);
        self
    }

    pub fn add_header(&mut self, name: &str, value: impl Into<Value>) -> ApiResult<&mut Self> {
        let value: Value = value.into();
        self.options.merge(RequestOption::Headers, json!({ name: value }))?;
        Ok(self)
    }

    pub fn remove_header(&mut self, name: &str) -> ApiResult<&mut Self> {
        self.options.remove(RequestOption::Headers, &Removal::from(name))?;
        Ok(self)
    }

    pub fn throw_http_errors(&mut self, enabled: bool) -> &mut Self {
        self.options.insert(RequestOption::HttpErrors, enabled);
        self
    }

    pub fn enable_http_errors(&mut self) -> &mut Self {
        self.throw_http_errors(true)
    }

    pub fn disable_http_errors(&mut self) -> &mut Self {
        self.throw_http_errors(false)
    }

    pub fn json(&mut self, body: Value) -> &mut Self {
        self.options.insert(RequestOption::Json, body);
        self
    }

    /// Asks the processor to decode the response as JSON and adds an `Accept` header.
    pub fn expects_json(&mut self, enabled: bool) -> ApiResult<&mut Self> {
        self.options.insert(RequestOption::ExpectsJson, enabled);
        if enabled {
            self.accepts_json()?;
        }
        Ok(self)
    }

    pub fn accepts_json(&mut self) -> ApiResult<&mut Self> {
        self.add_header("Accept", "application/json")
    }

    /// Multipart parts: `[{"name", "contents", "filename"?, "headers"?}, ...]`.
    pub fn multipart(&mut self, parts: Value) -> &mut Self {
        self.options.insert(RequestOption::Multipart, parts);
        self
    }

    pub fn on_headers(&mut self, hook: impl Fn(&HeaderMap) + Send + Sync + 'static) -> &mut Self {
        self.options
            .insert(RequestOption::OnHeaders, Hook::Headers(Arc::new(hook)));
        self
    }

    pub fn on_stats(&mut self, hook: impl Fn(&TransferStats) + Send + Sync + 'static) -> &mut Self {
        self.options.insert(RequestOption::OnStats, Hook::Stats(Arc::new(hook)));
        self
    }

    pub fn on_progress(&mut self, hook: impl Fn(u64, Option<u64>) + Send + Sync + 'static) -> &mut Self {
        self.options
            .insert(RequestOption::Progress, Hook::Progress(Arc::new(hook)));
        self
    }

    pub fn proxy(&mut self, proxy: impl Into<Value>) -> &mut Self {
        self.options.insert(RequestOption::Proxy, proxy.into());
        self
    }

    /// Query parameters as a mapping, a list of pairs, or a pre-encoded string.
    pub fn query(&mut self, query: Value) -> &mut Self {
        self.options.insert(RequestOption::Query, query);
        self
    }

    pub fn read_timeout(&mut self, seconds: f64) -> &mut Self {
        self.options.insert(RequestOption::ReadTimeout, seconds);
        self
    }

    /// Writes the response body to the file at `path` as well.
    pub fn sink(&mut self, path: impl Into<String>) -> &mut Self {
        self.options.insert(RequestOption::Sink, path.into());
        self
    }

    pub fn ssl_key(&mut self, value: impl Into<Value>) -> &mut Self {
        self.options.insert(RequestOption::SslKey, value.into());
        self
    }

    pub fn stream(&mut self, enabled: bool) -> &mut Self {
        self.options.insert(RequestOption::Stream, enabled);
        self
    }

    pub fn synchronous(&mut self, enabled: bool) -> &mut Self {
        self.options.insert(RequestOption::Synchronous, enabled);
        self
    }

    pub fn asynchronous(&mut self) -> &mut Self {
        self.synchronous(false)
    }

    /// `false` disables TLS verification; a string names a CA bundle.
    pub fn verify(&mut self, value: impl Into<Value>) -> &mut Self {
        self.options.insert(RequestOption::Verify, value.into());
        self
    }

    pub fn timeout(&mut self, seconds: f64) -> &mut Self {
        self.options.insert(RequestOption::Timeout, seconds);
        self
    }

    pub fn version(&mut self, version: &str) -> &mut Self {
        self.options.insert(RequestOption::Version, version);
        self
    }
}
