//! Transport layer bound to a single host.
//!
//! This module wraps `reqwest` (through `reqwest-middleware`, so that transient
//! failures can be retried with exponential backoff) and translates the validated
//! request options of this crate into transport settings.
//!
//! - [`HttpClient`] - a live client bound to one base url, created by a connector
//! - [`Response`] - a buffered response (status, headers, body)
//! - [`TransferStats`] - what an `on_stats` hook receives
//!
//! # Example
//!
//! ```rust,no_run
//! use apilink::http::HttpClient;
//! use apilink::request::RequestOptions;
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), apilink::ApiError> {
//! let client = HttpClient::new("http://localhost:8080".parse()?)?;
//! let response = client.request(Method::GET, "/health", &RequestOptions::new()).await?;
//! println!("{}: {}", response.status(), response.text());
//! # Ok(())
//! # }
//! ```

mod http_client;
mod types;
pub(crate) mod utils;

pub use http_client::HttpClient;
pub use types::{Response, TransferStats};
pub use utils::Credentials;
