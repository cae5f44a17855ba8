//! Event-type to handler registry.
//!
//! A consumer owns one router; each handler receives the decoded payload of
//! its event and signals success or failure through `Result`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A registered event handler. Implemented for any async closure taking the
/// event payload.
pub trait EventHandler: Send + Sync {
    fn call(&self, payload: Value) -> HandlerFuture;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn call(&self, payload: Value) -> HandlerFuture {
        Box::pin(self(payload))
    }
}

#[derive(Clone, Default)]
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event_type`. Re-registering replaces the
    /// previous handler.
    pub fn route(mut self, event_type: &str, handler: impl EventHandler + 'static) -> Self {
        if self
            .handlers
            .insert(event_type.to_string(), Arc::new(handler))
            .is_some()
        {
            warn!(event_type, "Replacing existing handler registration");
        }
        self
    }

    pub fn get(&self, event_type: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(event_type).cloned()
    }

    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort();
        types
    }
}
