//! Turning configuration into live connections.
//!
//! A [`Connector`] connects to a single host; the [`ConnectionFactory`] wraps a whole
//! configuration in a [`Connection`](crate::connection::Connection) whose client is
//! resolved by [`HostFailover`] on first use.

mod connector;
mod factory;

pub use connector::{Connector, HttpConnector};
pub use factory::{ConnectionBuilderFn, ConnectionFactory, ConnectionResolvers, HostFailover};
