// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use log::debug;
use reqwest::Method;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use super::{
    types::{Response, TransferStats},
    utils::{self, Credentials},
};
use crate::{
    error::{ApiError, ApiResult},
    request::{Hook, OptionValue, RequestOption, RequestOptions},
};

const DEFAULT_MAX_RETRIES: u32 = 0;

/// Options never sent with the liveness probe.
const PROBE_EXCLUDED: [RequestOption; 10] = [
    RequestOption::Body,
    RequestOption::Delay,
    RequestOption::FormParams,
    RequestOption::Json,
    RequestOption::Multipart,
    RequestOption::OnHeaders,
    RequestOption::OnStats,
    RequestOption::Progress,
    RequestOption::Query,
    RequestOption::Sink,
];

/// A live transport client bound to one host.
///
/// Relative request urls are resolved against the base url. `defaults` are applied to
/// every request, with the request's own options winning (headers merge key-wise).
/// A request whose client-level options differ from the defaults is sent through a
/// separately built client, cached by those options.
pub struct HttpClient {
    base_url: Url,
    client: ClientWithMiddleware,
    credentials: Option<Credentials>,
    defaults: RequestOptions,
    max_retries: u32,
    variants: Mutex<HashMap<String, ClientWithMiddleware>>,
    last_latency: RwLock<Option<(Duration, Instant)>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(base_url: Url) -> ApiResult<Self> {
        Self::with_options(base_url, None, RequestOptions::new(), DEFAULT_MAX_RETRIES)
    }

    /// Builds a client with connection-level options applied.
    ///
    /// `max_retries` enables exponential-backoff retries of transient transport failures
    /// (0 disables retrying).
    pub fn with_options(
        base_url: Url,
        credentials: Option<Credentials>,
        defaults: RequestOptions,
        max_retries: u32,
    ) -> ApiResult<Self> {
        Ok(Self {
            base_url,
            client: build_client(&defaults, max_retries)?,
            credentials,
            defaults,
            max_retries,
            variants: Mutex::new(HashMap::new()),
            last_latency: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// Sends a request and buffers the response body.
    ///
    /// Fails with [`ApiError::Status`] on 4xx/5xx responses unless `http_errors` is
    /// disabled for the request.
    pub async fn request(&self, method: Method, url: &str, options: &RequestOptions) -> ApiResult<Response> {
        let options = self.merged(options);
        self.execute(method, url, options).await
    }

    /// Issues the liveness `GET` against the base url.
    ///
    /// Only the connection's transport settings are used: bodies, query, sink, delay and
    /// hooks are left out, and error statuses count as a response.
    pub async fn probe(&self) -> ApiResult<Response> {
        let mut options = self.defaults.clone();
        for option in PROBE_EXCLUDED {
            options.take(option);
        }
        options.insert(RequestOption::HttpErrors, false);

        let response = self.execute(Method::GET, "", options).await?;
        debug!(url = self.base_url.as_str(), status = response.status().as_u16(); "Liveness check answered");
        Ok(response)
    }

    async fn execute(&self, method: Method, url: &str, options: RequestOptions) -> ApiResult<Response> {
        let mut url = self.base_url.join(url)?;
        if let Some(query) = options.value(RequestOption::Query) {
            utils::apply_query(&mut url, query)?;
        }

        if let Some(delay) = utils::delay(&options) {
            tokio::time::sleep(delay).await;
        }

        let client = self.client_for(&options)?;
        let request = client.request(method.clone(), url.clone());
        let request = utils::apply_request_options(request, &options, self.credentials.as_ref())?;

        if options.flag(RequestOption::Debug) == Some(true) {
            debug!(method = method.as_str(), url = url.as_str(), options:% = options.to_json(); "Sending request");
        }

        let start = Instant::now();
        let mut resp = request.send().await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        if let Some(Hook::Headers(on_headers)) = options.hook(RequestOption::OnHeaders) {
            on_headers(&headers);
        }

        let total = resp.content_length();
        let progress = match options.hook(RequestOption::Progress) {
            Some(Hook::Progress(progress)) => Some(progress),
            _ => None,
        };
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            body.extend_from_slice(&chunk);
            if let Some(progress) = progress {
                progress(body.len() as u64, total);
            }
        }

        let latency = start.elapsed();
        self.update_latency(latency).await;

        if let Some(Hook::Stats(on_stats)) = options.hook(RequestOption::OnStats) {
            on_stats(&TransferStats {
                method,
                url,
                status,
                elapsed: latency,
                bytes: body.len() as u64,
            });
        }

        if let Some(Value::String(sink)) = options.value(RequestOption::Sink) {
            tokio::fs::write(sink, &body).await?;
        }

        let http_errors = options.flag(RequestOption::HttpErrors).unwrap_or(true);
        if http_errors && (status.is_client_error() || status.is_server_error()) {
            return Err(ApiError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(Response::new(status, headers, body))
    }

    fn client_for(&self, options: &RequestOptions) -> ApiResult<ClientWithMiddleware> {
        let wanted = utils::client_level(options);
        if wanted == utils::client_level(&self.defaults) {
            return Ok(self.client.clone());
        }

        let key = wanted.to_json().to_string();
        let mut variants = self.variants.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = variants.get(&key) {
            return Ok(client.clone());
        }

        debug!(url = self.base_url.as_str(), options:% = key; "Building client for request-level settings");
        let client = build_client(&wanted, self.max_retries)?;
        variants.insert(key, client.clone());
        Ok(client)
    }

    fn merged(&self, options: &RequestOptions) -> RequestOptions {
        let mut merged = self.defaults.clone();
        for (option, value) in options {
            match (option, merged.get(*option), value) {
                (
                    RequestOption::Headers,
                    Some(OptionValue::Value(Value::Object(defaults))),
                    OptionValue::Value(Value::Object(headers)),
                ) => {
                    let mut combined = defaults.clone();
                    combined.extend(headers.clone());
                    merged.insert(*option, Value::Object(combined));
                },
                _ => {
                    merged.insert(*option, value.clone());
                },
            }
        }
        merged
    }

    async fn update_latency(&self, duration: Duration) {
        *self.last_latency.write().await = Some((duration, Instant::now()));
    }

    /// Round-trip time of the most recent request, if any.
    pub async fn latency(&self) -> Option<Duration> {
        self.last_latency.read().await.map(|(d, _)| d)
    }
}

fn build_client(options: &RequestOptions, max_retries: u32) -> ApiResult<ClientWithMiddleware> {
    let inner_client = utils::apply_client_options(reqwest::Client::builder(), options)?.build()?;

    let mut builder = reqwest_middleware::ClientBuilder::new(inner_client);
    if max_retries > 0 {
        let retry_policy = reqwest_retry::policies::ExponentialBackoff::builder().build_with_max_retries(max_retries);
        builder = builder.with(reqwest_retry::RetryTransientMiddleware::new_with_policy(retry_policy));
    }
    Ok(builder.build())
}
