//! Request execution notifications.
//!
//! A connection with an attached [`EventSink`] emits a [`RequestExecuted`] event for
//! every completed send, including sends skipped while pretending. Events are purely
//! informational; nothing in the connection depends on how they are consumed.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use apilink::events::ChannelEventSink;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! manager.set_event_sink(Arc::new(ChannelEventSink::new(tx)));
//!
//! while let Some(event) = rx.recv().await {
//!     println!("[{}] {} took {}ms", event.method, event.url, event.elapsed_ms);
//! }
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Method;

use crate::request::RequestOptions;

/// Emitted after a request has been sent (or skipped while pretending).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestExecuted {
    pub url: String,
    pub options: RequestOptions,
    pub method: Method,
    pub elapsed_ms: f64,
    pub connection_name: Option<String>,
}

pub type Listener = Arc<dyn Fn(&RequestExecuted) + Send + Sync>;

pub trait EventSink: Send + Sync {
    /// Delivers an event. Returns `false` if it could not be delivered.
    fn send(&self, event: RequestExecuted) -> bool;

    /// Registers a listener. Sinks that cannot hold listeners return `false`.
    fn listen(&self, _listener: Listener) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn send(&self, _event: RequestExecuted) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: tokio::sync::mpsc::UnboundedSender<RequestExecuted>,
}

impl ChannelEventSink {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<RequestExecuted>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: RequestExecuted) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Fans each event out to the registered listeners, in registration order.
#[derive(Default)]
pub struct Dispatcher {
    listeners: RwLock<Vec<Listener>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl EventSink for Dispatcher {
    fn send(&self, event: RequestExecuted) -> bool {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            listener(&event);
        }
        true
    }

    fn listen(&self, listener: Listener) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
        true
    }
}
