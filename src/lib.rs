pub mod cli;
pub mod config;
pub mod connection;
pub mod connectors;
pub mod error;
pub mod events;
pub mod http;
pub mod log;
pub mod manager;
pub mod request;
pub mod resolver;

pub use crate::config::{ApiConfig, ConnectionConfig};
pub use crate::connection::Connection;
pub use crate::error::{ApiError, ApiResult};
pub use crate::manager::ApiManager;
pub use crate::request::{Payload, RequestBuilder};
