// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for connection management and request execution.
//!
//! Every fallible operation in this crate returns [`ApiResult`]. The variants fall
//! into two groups:
//!
//! - **Programmer errors** ([`UnsupportedOption`](ApiError::UnsupportedOption),
//!   [`UnconfiguredConnection`](ApiError::UnconfiguredConnection),
//!   [`InvalidHostSet`](ApiError::InvalidHostSet), ...) are raised immediately and are
//!   never caught internally.
//! - **Transport errors** are caught once by the connection, wrapped into a
//!   [`RequestError`] that carries the request context, and re-raised.

use std::fmt;

use reqwest::{Method, StatusCode};
use thiserror::Error;

use crate::request::RequestOptions;

/// Errors that can occur while resolving connections or executing requests.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request option key outside the recognized option set was used.
    #[error("Invalid option type: [{option}]")]
    UnsupportedOption { option: String },

    /// A removal criteria does not fit the shape of the stored option value.
    #[error("Invalid removal criteria for option type: [{option}]")]
    InvalidRemovalCriteria { option: String },

    /// Callback options cannot be merged or appended to.
    #[error("Option [{option}] holds a callback and cannot be merged")]
    UnmergeableOption { option: String },

    /// An option value has a shape the transport cannot apply.
    #[error("Invalid value for option [{option}]: {reason}")]
    InvalidOptionValue { option: String, reason: String },

    /// No configuration exists for the requested connection name.
    #[error("API Connection [{name}] not configured.")]
    UnconfiguredConnection { name: String },

    /// The host list is empty or the driver is missing.
    #[error("{0}")]
    InvalidHostSet(String),

    /// No macro with the given name is registered on the connection.
    #[error("Request macro [{name}] does not exist.")]
    UnknownMacro { name: String },

    /// A candidate host could not be reached.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A request failed; the error carries the original request context.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The server returned a non-success HTTP status code.
    #[error("Server error {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ApiError {
    pub(crate) fn unsupported(option: impl Into<String>) -> Self {
        Self::UnsupportedOption { option: option.into() }
    }

    pub(crate) fn invalid_value(option: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidOptionValue {
            option: option.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// A single host failed to accept a connection during host failover.
///
/// The connection factory catches this error and moves on to the next candidate host.
/// Only the error raised by the last candidate escapes when every host fails.
#[derive(Debug, Error)]
#[error("Could not connect to [{host}]: {cause}")]
pub struct ConnectError {
    host: String,
    #[source]
    cause: Box<ApiError>,
}

impl ConnectError {
    pub fn new(host: impl Into<String>, cause: ApiError) -> Self {
        Self {
            host: host.into(),
            cause: Box::new(cause),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn cause(&self) -> &ApiError {
        &self.cause
    }
}

/// Uniform wrapper for any failure raised while sending a request.
///
/// Keeps the url, options and method of the originating call so that the failure can be
/// reported (or retried) with full context. The wrapped failure is exposed both through
/// [`cause`](RequestError::cause) and [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("{cause} (Request: [{method}] {url} {})", .options.to_json())]
pub struct RequestError {
    url: String,
    options: RequestOptions,
    method: Method,
    #[source]
    cause: Box<ApiError>,
}

impl RequestError {
    pub fn new(url: impl Into<String>, options: RequestOptions, method: Method, cause: ApiError) -> Self {
        Self {
            url: url.into(),
            options,
            method,
            cause: Box::new(cause),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn cause(&self) -> &ApiError {
        &self.cause
    }

    pub fn into_cause(self) -> ApiError {
        *self.cause
    }
}
