// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{RequestBuilder, RequestOption};
use crate::{error::ApiResult, http::Response};

/// The caller-facing result of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    /// A body that is not valid UTF-8, returned unchanged.
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The raw body for text and binary payloads.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Text(text) => Some(text.as_bytes()),
            Payload::Bytes(bytes) => Some(bytes),
            Payload::Json(_) => None,
        }
    }

    /// Deserializes the payload; text payloads are parsed as JSON first.
    pub fn deserialize<T: DeserializeOwned>(self) -> ApiResult<T> {
        match self {
            Payload::Json(value) => Ok(serde_json::from_value(value)?),
            Payload::Text(text) => Ok(serde_json::from_str(&text)?),
            Payload::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }
}

/// Converts a raw transport response into the value returned to the caller.
pub trait Processor: Send + Sync {
    fn process(&self, request: &RequestBuilder<'_>, response: Response) -> ApiResult<Payload>;
}

/// Returns the body as text, or decoded JSON when the request set `expects_json`.
///
/// An empty body decodes to `null`. Bodies that are not UTF-8 are returned as bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProcessor;

impl Processor for DefaultProcessor {
    fn process(&self, request: &RequestBuilder<'_>, response: Response) -> ApiResult<Payload> {
        if request.options().flag(RequestOption::ExpectsJson) == Some(true) {
            if response.body().iter().all(u8::is_ascii_whitespace) {
                return Ok(Payload::Json(Value::Null));
            }
            return Ok(Payload::Json(response.json()?));
        }

        Ok(match String::from_utf8(response.into_body()) {
            Ok(text) => Payload::Text(text),
            Err(e) => Payload::Bytes(e.into_bytes()),
        })
    }
}
