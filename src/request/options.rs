// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

//! The fixed set of recognized request options and the containers that hold them.
//!
//! Option keys arrive as strings (from configuration files or callers) and are validated
//! against [`RequestOption`] before anything is stored. Values are plain JSON, except
//! for the three callback options which hold a [`Hook`].

use std::{
    collections::{BTreeMap, btree_map},
    fmt,
    str::FromStr,
    sync::Arc,
};

use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::{
    error::{ApiError, ApiResult},
    http::TransferStats,
};

/// A request option recognized by the builder and the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestOption {
    /// Response-decoding hint for the post processor; never sent to the transport.
    ExpectsJson,
    AllowRedirects,
    Auth,
    Body,
    Cert,
    ConnectTimeout,
    Cookies,
    Debug,
    DecodeContent,
    Delay,
    Expect,
    ForceIpResolve,
    FormParams,
    Headers,
    HttpErrors,
    Json,
    Multipart,
    OnHeaders,
    OnStats,
    Progress,
    Proxy,
    Query,
    ReadTimeout,
    Sink,
    SslKey,
    Stream,
    Synchronous,
    Timeout,
    Verify,
    Version,
}

impl RequestOption {
    pub const ALL: [RequestOption; 30] = [
        RequestOption::ExpectsJson,
        RequestOption::AllowRedirects,
        RequestOption::Auth,
        RequestOption::Body,
        RequestOption::Cert,
        RequestOption::ConnectTimeout,
        RequestOption::Cookies,
        RequestOption::Debug,
        RequestOption::DecodeContent,
        RequestOption::Delay,
        RequestOption::Expect,
        RequestOption::ForceIpResolve,
        RequestOption::FormParams,
        RequestOption::Headers,
        RequestOption::HttpErrors,
        RequestOption::Json,
        RequestOption::Multipart,
        RequestOption::OnHeaders,
        RequestOption::OnStats,
        RequestOption::Progress,
        RequestOption::Proxy,
        RequestOption::Query,
        RequestOption::ReadTimeout,
        RequestOption::Sink,
        RequestOption::SslKey,
        RequestOption::Stream,
        RequestOption::Synchronous,
        RequestOption::Timeout,
        RequestOption::Verify,
        RequestOption::Version,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOption::ExpectsJson => "expects_json",
            RequestOption::AllowRedirects => "allow_redirects",
            RequestOption::Auth => "auth",
            RequestOption::Body => "body",
            RequestOption::Cert => "cert",
            RequestOption::ConnectTimeout => "connect_timeout",
            RequestOption::Cookies => "cookies",
            RequestOption::Debug => "debug",
            RequestOption::DecodeContent => "decode_content",
            RequestOption::Delay => "delay",
            RequestOption::Expect => "expect",
            RequestOption::ForceIpResolve => "force_ip_resolve",
            RequestOption::FormParams => "form_params",
            RequestOption::Headers => "headers",
            RequestOption::HttpErrors => "http_errors",
            RequestOption::Json => "json",
            RequestOption::Multipart => "multipart",
            RequestOption::OnHeaders => "on_headers",
            RequestOption::OnStats => "on_stats",
            RequestOption::Progress => "progress",
            RequestOption::Proxy => "proxy",
            RequestOption::Query => "query",
            RequestOption::ReadTimeout => "read_timeout",
            RequestOption::Sink => "sink",
            RequestOption::SslKey => "ssl_key",
            RequestOption::Stream => "stream",
            RequestOption::Synchronous => "synchronous",
            RequestOption::Timeout => "timeout",
            RequestOption::Verify => "verify",
            RequestOption::Version => "version",
        }
    }

    /// Returns whether the given key names a recognized option.
    pub fn is_supported(key: &str) -> bool {
        key.parse::<RequestOption>().is_ok()
    }
}

impl FromStr for RequestOption {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestOption::ALL
            .iter()
            .copied()
            .find(|option| option.as_str() == s)
            .ok_or_else(|| ApiError::unsupported(s))
    }
}

impl fmt::Display for RequestOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type HeadersHook = Arc<dyn Fn(&HeaderMap) + Send + Sync>;
pub type StatsHook = Arc<dyn Fn(&TransferStats) + Send + Sync>;
/// Called with the bytes received so far and the expected total, when known.
pub type ProgressHook = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// A callback stored under `on_headers`, `on_stats` or `progress`.
#[derive(Clone)]
pub enum Hook {
    Headers(HeadersHook),
    Stats(StatsHook),
    Progress(ProgressHook),
}

impl Hook {
    fn kind(&self) -> &'static str {
        match self {
            Hook::Headers(_) => "on_headers",
            Hook::Stats(_) => "on_stats",
            Hook::Progress(_) => "progress",
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({})", self.kind())
    }
}

impl PartialEq for Hook {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Hook::Headers(a), Hook::Headers(b)) => Arc::ptr_eq(a, b),
            (Hook::Stats(a), Hook::Stats(b)) => Arc::ptr_eq(a, b),
            (Hook::Progress(a), Hook::Progress(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The value stored for a single option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Value(Value),
    Hook(Hook),
}

impl OptionValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            OptionValue::Value(value) => Some(value),
            OptionValue::Hook(_) => None,
        }
    }

    pub fn as_hook(&self) -> Option<&Hook> {
        match self {
            OptionValue::Hook(hook) => Some(hook),
            OptionValue::Value(_) => None,
        }
    }

    /// Truthiness in the loose sense used by boolean flags (`null`, `false`, `0` and `""`
    /// are false).
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Hook(_) => true,
            OptionValue::Value(Value::Null) => false,
            OptionValue::Value(Value::Bool(b)) => *b,
            OptionValue::Value(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            OptionValue::Value(Value::String(s)) => !s.is_empty() && s != "0",
            OptionValue::Value(_) => true,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            OptionValue::Value(value) => value.clone(),
            OptionValue::Hook(hook) => Value::String(format!("<{} callback>", hook.kind())),
        }
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        OptionValue::Value(value)
    }
}

impl From<Hook> for OptionValue {
    fn from(hook: Hook) -> Self {
        OptionValue::Hook(hook)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Value(Value::Bool(value))
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Value(Value::String(value))
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        OptionValue::Value(Value::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Value(Value::from(value))
    }
}

/// Criteria for [`RequestOptions::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Remove the whole option.
    All,
    /// Remove one entry from a mapping-valued option.
    Key(String),
    /// Remove several entries from a mapping-valued option.
    Keys(Vec<String>),
}

impl From<&str> for Removal {
    fn from(key: &str) -> Self {
        Removal::Key(key.to_string())
    }
}

impl From<Vec<String>> for Removal {
    fn from(keys: Vec<String>) -> Self {
        Removal::Keys(keys)
    }
}

impl<const N: usize> From<[&str; N]> for Removal {
    fn from(keys: [&str; N]) -> Self {
        Removal::Keys(keys.iter().map(|k| k.to_string()).collect())
    }
}

/// Validated option set for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions(BTreeMap<RequestOption, OptionValue>);

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every key of a loosely typed map; nothing is built if any key is unknown.
    pub fn from_map<I, K, V>(map: I) -> ApiResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut options = BTreeMap::new();
        for (key, value) in map {
            options.insert(key.as_ref().parse::<RequestOption>()?, value.into());
        }
        Ok(Self(options))
    }

    pub fn get(&self, option: RequestOption) -> Option<&OptionValue> {
        self.0.get(&option)
    }

    /// The JSON value of an option, `None` for absent options and hooks.
    pub fn value(&self, option: RequestOption) -> Option<&Value> {
        self.get(option).and_then(OptionValue::as_value)
    }

    pub fn hook(&self, option: RequestOption) -> Option<&Hook> {
        self.get(option).and_then(OptionValue::as_hook)
    }

    pub fn flag(&self, option: RequestOption) -> Option<bool> {
        self.get(option).map(OptionValue::is_truthy)
    }

    pub fn contains(&self, option: RequestOption) -> bool {
        self.0.contains_key(&option)
    }

    pub fn insert(&mut self, option: RequestOption, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.0.insert(option, value.into())
    }

    /// Merges mapping values key-wise and treats everything else as multi-valued.
    pub fn merge(&mut self, option: RequestOption, value: impl Into<OptionValue>) -> ApiResult<()> {
        let unmergeable = || ApiError::UnmergeableOption {
            option: option.to_string(),
        };

        let OptionValue::Value(incoming) = value.into() else {
            return Err(unmergeable());
        };

        let existing = match self.0.remove(&option) {
            None => Value::Null,
            Some(OptionValue::Value(value)) => value,
            Some(hook @ OptionValue::Hook(_)) => {
                self.0.insert(option, hook);
                return Err(unmergeable());
            },
        };

        let merged = match (existing, incoming) {
            (Value::Null, incoming @ (Value::Object(_) | Value::Array(_))) => incoming,
            (Value::Object(mut current), Value::Object(incoming)) => {
                current.extend(incoming);
                Value::Object(current)
            },
            (existing @ Value::Object(_), _) | (existing, Value::Object(_)) => {
                self.restore(option, existing);
                return Err(unmergeable());
            },
            (Value::Array(mut current), Value::Array(incoming)) => {
                current.extend(incoming);
                Value::Array(current)
            },
            (Value::Array(mut current), incoming) => {
                current.push(incoming);
                Value::Array(current)
            },
            (Value::Null, incoming) => Value::Array(vec![incoming]),
            (existing, Value::Array(incoming)) => {
                let mut values = vec![existing];
                values.extend(incoming);
                Value::Array(values)
            },
            (existing, incoming) => Value::Array(vec![existing, incoming]),
        };

        self.0.insert(option, OptionValue::Value(merged));
        Ok(())
    }

    /// Removes an option or entries of a mapping-valued option.
    ///
    /// Removing entries from an absent option is a no-op. Removing entries from an option
    /// whose value is not a mapping fails with
    /// [`InvalidRemovalCriteria`](ApiError::InvalidRemovalCriteria).
    pub fn remove(&mut self, option: RequestOption, removal: &Removal) -> ApiResult<()> {
        let keys: &[String] = match removal {
            Removal::All => {
                self.0.remove(&option);
                return Ok(());
            },
            Removal::Key(key) => std::slice::from_ref(key),
            Removal::Keys(keys) => keys,
        };

        match self.0.get_mut(&option) {
            None => Ok(()),
            Some(OptionValue::Value(Value::Object(map))) => {
                for key in keys {
                    map.remove(key);
                }
                Ok(())
            },
            Some(_) => Err(ApiError::InvalidRemovalCriteria {
                option: option.to_string(),
            }),
        }
    }

    pub fn take(&mut self, option: RequestOption) -> Option<OptionValue> {
        self.0.remove(&option)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, RequestOption, OptionValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON rendering used in logs and error messages. Hooks render as placeholders.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(option, value)| (option.as_str().to_string(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    fn restore(&mut self, option: RequestOption, value: Value) {
        if !value.is_null() {
            self.0.insert(option, OptionValue::Value(value));
        }
    }
}

impl<'a> IntoIterator for &'a RequestOptions {
    type Item = (&'a RequestOption, &'a OptionValue);
    type IntoIter = btree_map::Iter<'a, RequestOption, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_option_parses_back_from_its_name() {
        for option in RequestOption::ALL {
            assert_eq!(option.as_str().parse::<RequestOption>().unwrap(), option);
        }
        assert!(!RequestOption::is_supported("base_uri"));
        assert!(matches!(
            "handler".parse::<RequestOption>(),
            Err(ApiError::UnsupportedOption { option }) if option == "handler"
        ));
    }

    #[test]
    fn from_map_rejects_the_whole_map_on_one_unknown_key() {
        let result = RequestOptions::from_map([("timeout", json!(3)), ("nope", json!(true))]);
        assert!(matches!(result, Err(ApiError::UnsupportedOption { .. })));
    }

    #[test]
    fn merge_combines_mappings_key_wise() {
        let mut options = RequestOptions::new();
        options.insert(RequestOption::Headers, json!({"Accept": "text/plain", "X-A": "1"}));
        options
            .merge(RequestOption::Headers, json!({"Accept": "application/json"}))
            .unwrap();

        assert_eq!(
            options.value(RequestOption::Headers),
            Some(&json!({"Accept": "application/json", "X-A": "1"}))
        );
    }

    #[test]
    fn merge_appends_scalars() {
        let mut options = RequestOptions::new();
        options.merge(RequestOption::Query, json!("a=1")).unwrap();
        options.merge(RequestOption::Query, json!("b=2")).unwrap();
        assert_eq!(options.value(RequestOption::Query), Some(&json!(["a=1", "b=2"])));

        options.insert(RequestOption::Delay, json!(5));
        options.merge(RequestOption::Delay, json!(10)).unwrap();
        assert_eq!(options.value(RequestOption::Delay), Some(&json!([5, 10])));
    }

    #[test]
    fn merge_refuses_to_mix_mapping_and_scalar() {
        let mut options = RequestOptions::new();
        options.insert(RequestOption::Headers, json!({"X-A": "1"}));

        let result = options.merge(RequestOption::Headers, json!("oops"));

        assert!(matches!(result, Err(ApiError::UnmergeableOption { .. })));
        assert_eq!(options.value(RequestOption::Headers), Some(&json!({"X-A": "1"})));
    }

    #[test]
    fn merge_refuses_hooks() {
        let hook = Hook::Headers(Arc::new(|_: &HeaderMap| {}));
        let mut options = RequestOptions::new();
        options.insert(RequestOption::OnHeaders, hook.clone());

        assert!(options.merge(RequestOption::OnHeaders, json!({"a": 1})).is_err());
        assert!(options.merge(RequestOption::Headers, hook.clone()).is_err());
        assert_eq!(options.hook(RequestOption::OnHeaders), Some(&hook));
    }

    #[test]
    fn remove_handles_each_criteria_shape() {
        let mut options = RequestOptions::new();
        options.insert(RequestOption::FormParams, json!({"a": 1, "b": 2, "c": 3}));

        options.remove(RequestOption::FormParams, &Removal::from("a")).unwrap();
        assert_eq!(options.value(RequestOption::FormParams), Some(&json!({"b": 2, "c": 3})));

        options.remove(RequestOption::FormParams, &Removal::from(["b", "c"])).unwrap();
        assert_eq!(options.value(RequestOption::FormParams), Some(&json!({})));

        options.remove(RequestOption::FormParams, &Removal::All).unwrap();
        assert!(!options.contains(RequestOption::FormParams));

        // absent option: nothing to do
        options.remove(RequestOption::Query, &Removal::from("x")).unwrap();
    }

    #[test]
    fn remove_key_from_scalar_option_fails_loudly() {
        let mut options = RequestOptions::new();
        options.insert(RequestOption::Timeout, json!(2.5));

        let result = options.remove(RequestOption::Timeout, &Removal::from("x"));

        assert!(matches!(result, Err(ApiError::InvalidRemovalCriteria { option }) if option == "timeout"));
        assert_eq!(options.value(RequestOption::Timeout), Some(&json!(2.5)));
    }

    #[test]
    fn to_json_renders_hooks_as_placeholders() {
        let mut options = RequestOptions::new();
        options.insert(RequestOption::Timeout, json!(1));
        options.insert(RequestOption::Progress, Hook::Progress(Arc::new(|_: u64, _: Option<u64>| {})));

        assert_eq!(
            options.to_json(),
            json!({"progress": "<progress callback>", "timeout": 1})
        );
    }
}
