// Copyright 2025 The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

//! Translation of request option values into `reqwest` settings.
//!
//! Options that `reqwest` only supports on the client ([`CLIENT_LEVEL`]) are applied by
//! [`apply_client_options`] when a client is built. Options that can vary per request are
//! applied by [`apply_request_options`] on every send.

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    time::Duration,
};

use reqwest::{
    Certificate, ClientBuilder, Identity, Proxy, Version,
    multipart::{Form, Part},
    redirect,
};
use reqwest_middleware::RequestBuilder;
use serde_json::Value;
use url::Url;

use crate::{
    error::{ApiError, ApiResult},
    request::{RequestOption, RequestOptions},
};

/// Username and optional password used for HTTP basic authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Options `reqwest` only honours when the client is built.
pub(crate) const CLIENT_LEVEL: [RequestOption; 11] = [
    RequestOption::AllowRedirects,
    RequestOption::Cert,
    RequestOption::ConnectTimeout,
    RequestOption::Cookies,
    RequestOption::DecodeContent,
    RequestOption::ForceIpResolve,
    RequestOption::Proxy,
    RequestOption::ReadTimeout,
    RequestOption::SslKey,
    RequestOption::Verify,
    RequestOption::Version,
];

/// The subset of `options` that shapes the client rather than the request.
pub(crate) fn client_level(options: &RequestOptions) -> RequestOptions {
    let mut subset = RequestOptions::new();
    for option in CLIENT_LEVEL {
        if let Some(value) = options.get(option) {
            subset.insert(option, value.clone());
        }
    }
    subset
}

/// Reads a duration expressed in (possibly fractional) seconds. Zero means "no limit", as
/// does a value too large to represent.
pub(crate) fn seconds(value: &Value) -> Option<Duration> {
    value
        .as_f64()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn millis(value: &Value) -> Option<Duration> {
    value.as_u64().filter(|ms| *ms > 0).map(Duration::from_millis)
}

pub(crate) fn delay(options: &RequestOptions) -> Option<Duration> {
    options.value(RequestOption::Delay).and_then(millis)
}

/// Renders a scalar as it would appear in a header, query string or form field.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}

fn pairs(option: RequestOption, value: &Value) -> ApiResult<Vec<(String, String)>> {
    match value {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), scalar(v))).collect()),
        _ => Err(ApiError::invalid_value(option, "expected a mapping")),
    }
}

fn http_version(value: &Value) -> ApiResult<Version> {
    match scalar(value).as_str() {
        "1.0" => Ok(Version::HTTP_10),
        "1" | "1.1" => Ok(Version::HTTP_11),
        "2" | "2.0" => Ok(Version::HTTP_2),
        other => Err(ApiError::invalid_value(
            RequestOption::Version,
            format!("unsupported protocol version {other}"),
        )),
    }
}

/// Appends the `query` option to the url. Accepts a mapping, a raw query string, or a
/// list of either (the shape produced by repeated `add_option` calls).
pub(crate) fn apply_query(url: &mut Url, value: &Value) -> ApiResult<()> {
    match value {
        Value::Null => {},
        Value::Object(map) => {
            let mut query = url.query_pairs_mut();
            for (key, value) in map {
                query.append_pair(key, &scalar(value));
            }
        },
        Value::String(raw) => {
            let raw = raw.trim_start_matches('?');
            let combined = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{raw}"),
                _ => raw.to_string(),
            };
            url.set_query(Some(&combined));
        },
        Value::Array(items) => {
            for item in items {
                apply_query(url, item)?;
            }
        },
        _ => return Err(ApiError::invalid_value(RequestOption::Query, "expected a mapping or string")),
    }
    Ok(())
}

fn multipart(value: &Value) -> ApiResult<Form> {
    let Value::Array(parts) = value else {
        return Err(ApiError::invalid_value(RequestOption::Multipart, "expected a list of parts"));
    };

    let mut form = Form::new();
    for part in parts {
        let name = part
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::invalid_value(RequestOption::Multipart, "part is missing a name"))?;
        let contents = part.get("contents").map(scalar).unwrap_or_default();

        let mut field = Part::text(contents);
        if let Some(filename) = part.get("filename").and_then(Value::as_str) {
            field = field.file_name(filename.to_string());
        }
        form = form.part(name.to_string(), field);
    }
    Ok(form)
}

fn basic_auth(request: RequestBuilder, value: &Value) -> ApiResult<RequestBuilder> {
    let Value::Array(parts) = value else {
        return Err(ApiError::invalid_value(RequestOption::Auth, "expected [username, password, type?]"));
    };

    match parts.get(2).map(scalar).as_deref() {
        None | Some("basic") => {},
        Some(other) => {
            return Err(ApiError::invalid_value(
                RequestOption::Auth,
                format!("unsupported authentication type {other}"),
            ));
        },
    }

    let username = parts.first().map(scalar).unwrap_or_default();
    let password = parts.get(1).filter(|p| !p.is_null()).map(scalar);
    Ok(request.basic_auth(username, password))
}

/// Applies the per-request options to an outgoing request.
///
/// `credentials` are used when the options carry no `auth` entry at all; an explicit
/// `auth = null` disables authentication for the request.
pub(crate) fn apply_request_options(
    mut request: RequestBuilder,
    options: &RequestOptions,
    credentials: Option<&Credentials>,
) -> ApiResult<RequestBuilder> {
    if let Some(headers) = options.value(RequestOption::Headers) {
        for (name, value) in pairs(RequestOption::Headers, headers)? {
            request = request.header(name, value);
        }
    }

    if options.flag(RequestOption::Expect) == Some(true) {
        request = request.header(reqwest::header::EXPECT, "100-continue");
    }

    match options.value(RequestOption::Auth) {
        Some(Value::Null) => {},
        Some(auth) => request = basic_auth(request, auth)?,
        None if !options.contains(RequestOption::Auth) => {
            if let Some(credentials) = credentials {
                request = request.basic_auth(&credentials.username, credentials.password.as_ref());
            }
        },
        None => {},
    }

    if let Some(form) = options.value(RequestOption::FormParams) {
        request = request.form(&pairs(RequestOption::FormParams, form)?);
    }

    if let Some(json) = options.value(RequestOption::Json) {
        request = request.json(json);
    }

    if let Some(body) = options.value(RequestOption::Body) {
        request = request.body(scalar(body));
    }

    if let Some(parts) = options.value(RequestOption::Multipart) {
        request = request.multipart(multipart(parts)?);
    }

    if let Some(timeout) = options.value(RequestOption::Timeout).and_then(seconds) {
        request = request.timeout(timeout);
    }

    if let Some(version) = options.value(RequestOption::Version) {
        request = request.version(http_version(version)?);
    }

    Ok(request)
}

fn redirect_policy(value: &Value) -> ApiResult<redirect::Policy> {
    match value {
        Value::Bool(false) | Value::Null => Ok(redirect::Policy::none()),
        Value::Bool(true) => Ok(redirect::Policy::default()),
        Value::Object(map) => {
            let max = map.get("max").and_then(Value::as_u64).unwrap_or(5);
            Ok(redirect::Policy::limited(max as usize))
        },
        _ => Err(ApiError::invalid_value(
            RequestOption::AllowRedirects,
            "expected a boolean or {max = n}",
        )),
    }
}

fn file_path(option: RequestOption, value: &Value) -> ApiResult<String> {
    match value {
        Value::String(path) => Ok(path.clone()),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::invalid_value(option, "expected a file path")),
        _ => Err(ApiError::invalid_value(option, "expected a file path")),
    }
}

/// Applies the options `reqwest` only honours at the client level.
pub(crate) fn apply_client_options(mut builder: ClientBuilder, options: &RequestOptions) -> ApiResult<ClientBuilder> {
    if let Some(timeout) = options.value(RequestOption::ConnectTimeout).and_then(seconds) {
        builder = builder.connect_timeout(timeout);
    }

    if let Some(timeout) = options.value(RequestOption::ReadTimeout).and_then(seconds) {
        builder = builder.read_timeout(timeout);
    }

    if let Some(timeout) = options.value(RequestOption::Timeout).and_then(seconds) {
        builder = builder.timeout(timeout);
    }

    match options.value(RequestOption::Verify) {
        Some(Value::Bool(false)) => builder = builder.danger_accept_invalid_certs(true),
        Some(Value::String(bundle)) => {
            let pem = std::fs::read(bundle)?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        },
        _ => {},
    }

    match options.value(RequestOption::Proxy) {
        Some(Value::String(proxy)) => builder = builder.proxy(Proxy::all(proxy.as_str())?),
        Some(Value::Object(map)) => {
            if let Some(proxy) = map.get("http").and_then(Value::as_str) {
                builder = builder.proxy(Proxy::http(proxy)?);
            }
            if let Some(proxy) = map.get("https").and_then(Value::as_str) {
                builder = builder.proxy(Proxy::https(proxy)?);
            }
        },
        Some(Value::Null) | None => {},
        Some(_) => return Err(ApiError::invalid_value(RequestOption::Proxy, "expected a url or mapping")),
    }

    if let Some(redirects) = options.value(RequestOption::AllowRedirects) {
        builder = builder.redirect(redirect_policy(redirects)?);
    }

    if let Some(cookies) = options.flag(RequestOption::Cookies) {
        builder = builder.cookie_store(cookies);
    }

    if let Some(decode) = options.flag(RequestOption::DecodeContent) {
        builder = builder.gzip(decode);
    }

    match options.value(RequestOption::ForceIpResolve).and_then(Value::as_str) {
        Some("v4") => builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        Some("v6") => builder = builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        _ => {},
    }

    if let Some(version) = options.value(RequestOption::Version) {
        builder = match http_version(version)? {
            Version::HTTP_2 => builder.http2_prior_knowledge(),
            _ => builder.http1_only(),
        };
    }

    if let Some(cert) = options.value(RequestOption::Cert) {
        let cert_path = file_path(RequestOption::Cert, cert)?;
        let key_path = match options.value(RequestOption::SslKey) {
            Some(key) => file_path(RequestOption::SslKey, key)?,
            None => cert_path.clone(),
        };
        let cert = std::fs::read(&cert_path)?;
        let key = std::fs::read(&key_path)?;
        builder = builder.identity(Identity::from_pkcs8_pem(&cert, &key)?);
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn seconds_ignores_zero_and_negative() {
        assert_eq!(seconds(&json!(1.5)), Some(Duration::from_millis(1500)));
        assert_eq!(seconds(&json!(0)), None);
        assert_eq!(seconds(&json!(-3)), None);
        assert_eq!(seconds(&json!("5")), None);
    }

    #[test]
    fn seconds_treats_unrepresentable_values_as_unlimited() {
        assert_eq!(seconds(&json!(1e30)), None);
        assert_eq!(seconds(&json!(f64::MAX)), None);
    }

    #[test]
    fn client_level_keeps_only_client_settings() {
        let options = RequestOptions::from_map([
            ("allow_redirects", json!(false)),
            ("read_timeout", json!(3)),
            ("timeout", json!(10)),
            ("headers", json!({"X-A": "1"})),
        ])
        .unwrap();

        let subset = client_level(&options);

        assert_eq!(subset.len(), 2);
        assert!(subset.contains(RequestOption::AllowRedirects));
        assert!(subset.contains(RequestOption::ReadTimeout));
    }

    #[test]
    fn query_accepts_mapping_string_and_list() {
        let mut url = Url::parse("https://api.test/widgets?fixed=1").unwrap();
        apply_query(&mut url, &json!({"page": 2, "active": true})).unwrap();
        apply_query(&mut url, &json!("?sort=name")).unwrap();
        apply_query(&mut url, &json!([{"a": "x y"}, "b=2"])).unwrap();

        assert_eq!(url.query(), Some("fixed=1&active=1&page=2&sort=name&a=x+y&b=2"));
    }

    #[test]
    fn query_rejects_numbers() {
        let mut url = Url::parse("https://api.test/").unwrap();
        assert!(matches!(
            apply_query(&mut url, &json!(5)),
            Err(ApiError::InvalidOptionValue { .. })
        ));
    }

    #[test]
    fn version_strings_map_to_http_versions() {
        assert_eq!(http_version(&json!("1.1")).unwrap(), Version::HTTP_11);
        assert_eq!(http_version(&json!(2)).unwrap(), Version::HTTP_2);
        assert_eq!(http_version(&json!(2.0)).unwrap(), Version::HTTP_2);
        assert!(http_version(&json!("3")).is_err());
    }

    #[test]
    fn client_options_reject_malformed_redirect_policy() {
        let options = RequestOptions::from_map([("allow_redirects", json!("sometimes"))]).unwrap();
        assert!(apply_client_options(reqwest::Client::builder(), &options).is_err());
    }

    #[test]
    fn client_options_build_a_client() {
        let options = RequestOptions::from_map([
            ("connect_timeout", json!(2)),
            ("read_timeout", json!(5)),
            ("verify", json!(false)),
            ("allow_redirects", json!({"max": 2})),
            ("cookies", json!(true)),
            ("decode_content", json!(true)),
            ("force_ip_resolve", json!("v4")),
        ])
        .unwrap();

        let builder = apply_client_options(reqwest::Client::builder(), &options).unwrap();
        assert!(builder.build().is_ok());
    }
}
