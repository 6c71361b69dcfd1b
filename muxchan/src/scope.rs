//! Scoped channel: a namespaced facade over a shared transport
//!
//! Every name a scope is given is qualified as `"<scope_id>:<name>"` before
//! delegating to the parent, so independent logical sub-channels share one
//! connection without colliding. Destroying a scope removes its listeners in
//! both namespaces and nothing else.

use crate::channel::{Channel, RequestOptions, Responder};
use crate::error::Rejection;
use crate::registry::ListenerId;
use crate::value::DeepValue;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// A namespaced view of a [`Channel`]
#[derive(Clone)]
pub struct ScopedChannel {
    parent: Channel,
    scope_id: String,
}

impl ScopedChannel {
    pub(crate) fn new(parent: Channel, scope_id: &str) -> Self {
        Self {
            parent,
            scope_id: scope_id.to_string(),
        }
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}:{}", self.scope_id, name)
    }

    pub fn on_request<F, Fut, R>(&self, name: &str, handler: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, Rejection>> + Send + 'static,
        R: Into<DeepValue> + Send + 'static,
    {
        self.parent.on_request(&self.qualify(name), handler)
    }

    pub fn once_request<F, Fut, R>(&self, name: &str, handler: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, Rejection>> + Send + 'static,
        R: Into<DeepValue> + Send + 'static,
    {
        self.parent.once_request(&self.qualify(name), handler)
    }

    pub fn on_raw_request<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(String, Value, Responder) + Send + Sync + 'static,
    {
        self.parent.on_raw_request(&self.qualify(name), listener)
    }

    pub fn on_event<F, Fut>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.parent.on_event(&self.qualify(name), listener)
    }

    pub fn once_event<F, Fut>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.parent.once_event(&self.qualify(name), listener)
    }

    pub fn off_event(&self, name: &str, id: Option<ListenerId>) {
        self.parent.off_event(&self.qualify(name), id);
    }

    pub fn off_request(&self, name: &str, id: Option<ListenerId>) {
        self.parent.off_request(&self.qualify(name), id);
    }

    pub async fn send_event(&self, name: &str, data: impl Serialize) -> Result<()> {
        self.parent.send_event(&self.qualify(name), data).await
    }

    pub async fn send_request(&self, name: &str, data: impl Into<DeepValue>) -> Result<Value> {
        self.parent.send_request(&self.qualify(name), data).await
    }

    pub async fn send_request_with(
        &self,
        name: &str,
        data: impl Into<DeepValue>,
        options: RequestOptions,
    ) -> Result<Value> {
        self.parent
            .send_request_with(&self.qualify(name), data, options)
            .await
    }

    pub async fn request<P, R>(&self, name: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.parent.request(&self.qualify(name), params).await
    }

    /// Remove every listener registered under this scope, in both the event
    /// and request namespaces
    pub fn clear_listeners(&self) {
        self.parent.clear_scope_listeners(&self.scope_id);
    }

    /// Clear this scope's listeners and drop it from the parent's registry.
    /// The parent channel and its other scopes are unaffected.
    pub fn destroy(&self) {
        self.parent.destroy_scope(&self.scope_id);
    }
}
