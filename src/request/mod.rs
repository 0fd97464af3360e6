//! Request construction and response processing.
//!
//! - [`RequestOption`] / [`RequestOptions`] - the recognized option set and its validated container
//! - [`RequestBuilder`] - fluent builder that sends through a [`Connection`](crate::connection::Connection)
//! - [`Processor`] - turns a raw response into a [`Payload`]

mod builder;
mod options;
mod processor;

pub use builder::{BuilderField, Macro, RequestBuilder};
pub use options::{
    HeadersHook, Hook, OptionValue, ProgressHook, Removal, RequestOption, RequestOptions, StatsHook,
};
pub use processor::{DefaultProcessor, Payload, Processor};
