//! Channel facade and dispatch router
//!
//! A [`Channel`] turns one injected [`Transport`] into a typed
//! request/response + publish/subscribe protocol. A single router task per
//! channel pulls inbound payloads and classifies each frame as a request, a
//! response, or an event; outbound requests register into the pending table
//! before their envelope is written, then race the response against a
//! timeout.

use crate::envelope::{self, Envelope, Payload};
use crate::error::{reconstruct, Rejection, WireError};
use crate::pending::PendingRequests;
use crate::registry::{ListenerId, ListenerSet, TapSet};
use crate::scope::ScopedChannel;
use crate::transport::Transport;
use crate::value::DeepValue;
use crate::{Error, Result};
use dashmap::DashSet;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::backtrace::Backtrace;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) type EventCallback =
    Arc<dyn Fn(String, Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub(crate) type RequestCallback = Arc<dyn Fn(String, Value, Responder) + Send + Sync>;
type MessageTap = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;
type MessageErrorTap = Arc<dyn Fn(&Error, Option<&Value>) + Send + Sync>;
type RemoteErrorHook = Arc<dyn Fn(Error) -> BoxFuture<'static, Error> + Send + Sync>;

/// Construction-time configuration
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Skip text encode/decode and move structured values directly
    pub raw_passthrough: bool,
    /// Emit reconstructed remote stacks through `tracing` before delivery
    pub print_remote_rejections: bool,
    /// Default window a request waits for its response
    pub response_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            raw_passthrough: false,
            print_remote_rejections: false,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

/// Per-call overrides for [`Channel::send_request_with`]
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub response_timeout: Option<Duration>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    events: ListenerSet<EventCallback>,
    requests: ListenerSet<RequestCallback>,
    message_taps: TapSet<MessageTap>,
    error_taps: TapSet<MessageErrorTap>,
    pending: PendingRequests,
    scopes: DashSet<String>,
    response_timeout_ms: AtomicU64,
    remote_error_hook: RwLock<Option<RemoteErrorHook>>,
    raw_passthrough: bool,
    print_remote_rejections: bool,
    router: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Inner {
    async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        let payload = envelope::encode(envelope, self.raw_passthrough)?;
        self.transport.send(payload).await
    }

    fn fire_error_taps(&self, err: &Error, frame: Option<&Value>) {
        for tap in self.error_taps.snapshot() {
            tap(err, frame);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.router.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// The clonable handle a request handler answers through.
///
/// Exactly one response per request reaches the wire: the first `respond`
/// wins and later calls are logged no-ops.
#[derive(Clone)]
pub struct Responder {
    inner: Arc<Inner>,
    request_name: String,
    request_id: String,
    responded: Arc<AtomicBool>,
}

impl Responder {
    fn new(inner: Arc<Inner>, request_name: String, request_id: String) -> Self {
        Self {
            inner,
            request_name,
            request_id,
            responded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send the response envelope for this request
    pub fn respond(&self, outcome: std::result::Result<Value, Rejection>) {
        if self.responded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                request = %self.request_name,
                id = %self.request_id,
                "duplicate response ignored"
            );
            return;
        }
        let envelope = match outcome {
            Ok(data) => Envelope::response(
                self.request_name.clone(),
                self.request_id.clone(),
                data,
                None,
            ),
            Err(rejection) => Envelope::response(
                self.request_name.clone(),
                self.request_id.clone(),
                Value::Null,
                Some(rejection.into_wire_value()),
            ),
        };
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(err) = inner.send_envelope(&envelope).await {
                tracing::warn!(error = %err, "failed to send response");
            }
        });
    }
}

/// A bidirectional message channel over one injected transport
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Create a channel with default options
    pub fn new(transport: impl Transport) -> Self {
        Self::with_options(transport, ChannelOptions::default())
    }

    /// Create a channel and spawn its router task
    pub fn with_options(transport: impl Transport, options: ChannelOptions) -> Self {
        let inner = Arc::new(Inner {
            transport: Arc::new(transport),
            events: ListenerSet::new(),
            requests: ListenerSet::new(),
            message_taps: TapSet::new(),
            error_taps: TapSet::new(),
            pending: PendingRequests::new(),
            scopes: DashSet::new(),
            response_timeout_ms: AtomicU64::new(options.response_timeout.as_millis() as u64),
            remote_error_hook: RwLock::new(None),
            raw_passthrough: options.raw_passthrough,
            print_remote_rejections: options.print_remote_rejections,
            router: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let transport = inner.transport.clone();
        let handle = tokio::spawn(Self::router_loop(weak, transport));
        if let Ok(mut slot) = inner.router.lock() {
            *slot = Some(handle);
        }

        Self { inner }
    }

    /// Serialized inbound loop: one frame is fully classified before the next
    /// is pulled, so the pending table and registries never race per channel.
    async fn router_loop(weak: Weak<Inner>, transport: Arc<dyn Transport>) {
        loop {
            let payload = match transport.recv().await {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::debug!(error = %err, "inbound stream ended");
                    break;
                }
            };
            let Some(inner) = weak.upgrade() else { break };
            Channel { inner }.dispatch(payload).await;
        }
    }

    /// Classify one inbound frame and route it
    async fn dispatch(&self, payload: Payload) {
        let frame = match envelope::decode(&payload) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable frame");
                self.inner.fire_error_taps(&err, None);
                return;
            }
        };

        for tap in self.inner.message_taps.snapshot() {
            if let Err(err) = tap(&frame) {
                tracing::warn!(error = %err, "message tap failed");
                self.inner.fire_error_taps(&err, Some(&frame));
            }
        }

        let Some(env) = Envelope::from_value(&frame) else {
            tracing::trace!("frame without a type, ignoring");
            return;
        };

        if let Some(request_id) = env.uuid {
            self.dispatch_request(env.kind, env.data, request_id);
        } else if let Some(response_id) = env.response {
            let outcome = match env.error {
                Some(error_value) => Err(error_value),
                None => Ok(env.data),
            };
            if !self.inner.pending.settle(&response_id, outcome) {
                tracing::warn!(response = %response_id, "response without a pending request");
            }
        } else {
            self.dispatch_event(&env.kind, env.data, &frame).await;
        }
    }

    fn dispatch_request(&self, name: String, data: Value, request_id: String) {
        let responder = Responder::new(self.inner.clone(), name.clone(), request_id);
        if !self.inner.requests.has(&name) {
            tracing::debug!(request = %name, "no handler registered");
            responder.respond(Err(Rejection::Error(WireError::no_handler(&name))));
            return;
        }
        for callback in self.inner.requests.fetch(&name) {
            callback(name.clone(), data.clone(), responder.clone());
        }
        for callback in self.inner.requests.fetch_any() {
            callback(name.clone(), data.clone(), responder.clone());
        }
    }

    async fn dispatch_event(&self, name: &str, data: Value, frame: &Value) {
        let named = self.inner.events.fetch(name);
        let any = self.inner.events.fetch_any();
        for callback in named.into_iter().chain(any) {
            if let Err(err) = callback(name.to_string(), data.clone()).await {
                tracing::warn!(event = %name, error = %err, "event listener failed");
                self.inner.fire_error_taps(&err, Some(frame));
            }
        }
    }

    // ---- request handlers ----------------------------------------------

    /// Register a request handler. The handler's result is deep-resolved
    /// before the response is sent; a returned [`Rejection`] becomes the
    /// response's error field.
    pub fn on_request<F, Fut, R>(&self, name: &str, handler: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, Rejection>> + Send + 'static,
        R: Into<DeepValue> + Send + 'static,
    {
        self.inner.requests.insert(name, false, wrap_handler(handler))
    }

    /// Register a request handler removed after its first invocation
    pub fn once_request<F, Fut, R>(&self, name: &str, handler: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, Rejection>> + Send + 'static,
        R: Into<DeepValue> + Send + 'static,
    {
        self.inner.requests.insert(name, true, wrap_handler(handler))
    }

    /// Register a raw request listener answering through the [`Responder`]
    pub fn on_raw_request<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(String, Value, Responder) + Send + Sync + 'static,
    {
        self.inner.requests.insert(name, false, Arc::new(listener))
    }

    /// Observe every inbound request regardless of name. Catch-all listeners
    /// do not count as handlers for the no-handler rejection.
    pub fn on_any_request<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(String, Value, Responder) + Send + Sync + 'static,
    {
        self.inner.requests.insert_any(false, Arc::new(listener))
    }

    /// Remove one request listener by id, or all listeners for the name
    pub fn off_request(&self, name: &str, id: Option<ListenerId>) {
        self.inner.requests.remove(name, id);
    }

    pub fn off_any_request(&self, id: ListenerId) {
        self.inner.requests.remove_any(id);
    }

    // ---- event listeners -------------------------------------------------

    /// Register an event listener
    pub fn on_event<F, Fut>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner.events.insert(name, false, wrap_listener(listener))
    }

    /// Register an event listener removed after its first invocation
    pub fn once_event<F, Fut>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner.events.insert(name, true, wrap_listener(listener))
    }

    /// Observe every inbound event regardless of name
    pub fn on_any_event<F, Fut>(&self, listener: F) -> ListenerId
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let listener = Arc::new(listener);
        let callback: EventCallback =
            Arc::new(move |name, data| Box::pin(listener(name, data)));
        self.inner.events.insert_any(false, callback)
    }

    /// Remove one event listener by id, or all listeners for the name
    pub fn off_event(&self, name: &str, id: Option<ListenerId>) {
        self.inner.events.remove(name, id);
    }

    pub fn off_any_event(&self, id: ListenerId) {
        self.inner.events.remove_any(id);
    }

    // ---- diagnostic taps ---------------------------------------------------

    /// Observe every decoded inbound frame before routing
    pub fn on_message<F>(&self, tap: F) -> ListenerId
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.message_taps.insert(Arc::new(tap))
    }

    pub fn off_message(&self, id: ListenerId) {
        self.inner.message_taps.remove(id);
    }

    /// Observe decode and dispatch failures, independently of any request
    pub fn on_message_error<F>(&self, tap: F) -> ListenerId
    where
        F: Fn(&Error, Option<&Value>) + Send + Sync + 'static,
    {
        self.inner.error_taps.insert(Arc::new(tap))
    }

    pub fn off_message_error(&self, id: ListenerId) {
        self.inner.error_taps.remove(id);
    }

    // ---- outbound ----------------------------------------------------------

    /// Publish an event. Fire-and-forget semantics, but the transport write
    /// is awaited so a failed send is observable.
    pub async fn send_event(&self, name: &str, data: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(data)?;
        self.inner.send_envelope(&Envelope::event(name, value)).await
    }

    /// Send a request and await its response data
    pub async fn send_request(&self, name: &str, data: impl Into<DeepValue>) -> Result<Value> {
        self.send_request_with(name, data, RequestOptions::default())
            .await
    }

    /// Send a request with per-call options.
    ///
    /// If the timeout fires while the transport reports itself already
    /// closed, the timeout is suppressed and the future never settles: a
    /// disconnect teardown must not masquerade as a flood of timeouts.
    /// Dropping the returned future before it settles retires its entry in
    /// the pending table.
    pub async fn send_request_with(
        &self,
        name: &str,
        data: impl Into<DeepValue>,
        options: RequestOptions,
    ) -> Result<Value> {
        let origin_stack = Backtrace::force_capture().to_string();
        let deep: DeepValue = data.into();
        let data = deep.resolve().await;

        let id = Uuid::new_v4().to_string();
        // The guard retires the entry if this future is dropped unsettled.
        let (receiver, _guard) = self.inner.pending.register(&id);
        let envelope = Envelope::request(name, data, &id);
        self.inner.send_envelope(&envelope).await?;

        let window = options
            .response_timeout
            .unwrap_or_else(|| self.response_timeout());
        match tokio::time::timeout(window, receiver).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(error_value))) => {
                Err(self.deliver_remote_error(&origin_stack, error_value).await)
            }
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                self.inner.pending.discard(&id);
                if self.inner.transport.is_closed() {
                    tracing::debug!(
                        request = name,
                        id = %id,
                        "timeout after close, leaving request unsettled"
                    );
                    std::future::pending().await
                } else {
                    Err(Error::response_timeout(name))
                }
            }
        }
    }

    /// Typed request convenience over [`Channel::send_request`]
    pub async fn request<P, R>(&self, name: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = serde_json::to_value(params)?;
        let response = self.send_request(name, value).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Send a bare frame outside the envelope protocol. The peer observes it
    /// through its message taps; the router ignores it otherwise.
    pub async fn send_raw(&self, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let payload = envelope::encode_raw(&value, self.inner.raw_passthrough)?;
        self.inner.transport.send(payload).await
    }

    // ---- scopes, configuration, lifecycle -----------------------------------

    /// A namespaced facade over this channel. Repeated calls with the same id
    /// address the same underlying scope.
    pub fn scope(&self, scope_id: &str) -> ScopedChannel {
        self.inner.scopes.insert(scope_id.to_string());
        ScopedChannel::new(self.clone(), scope_id)
    }

    /// Remove every listener registered under the scope's prefix, in both the
    /// event and request namespaces, then drop the scope. The transport and
    /// other scopes are untouched. An id that was never issued by [`scope`]
    /// is a no-op: listeners whose literal names happen to carry the prefix
    /// are not torn down.
    ///
    /// [`scope`]: Channel::scope
    pub fn destroy_scope(&self, scope_id: &str) {
        if self.inner.scopes.remove(scope_id).is_none() {
            tracing::debug!(scope = %scope_id, "destroy of unknown scope ignored");
            return;
        }
        let prefix = format!("{scope_id}:");
        self.inner.events.remove_prefix(&prefix);
        self.inner.requests.remove_prefix(&prefix);
    }

    pub(crate) fn clear_scope_listeners(&self, scope_id: &str) {
        let prefix = format!("{scope_id}:");
        self.inner.events.remove_prefix(&prefix);
        self.inner.requests.remove_prefix(&prefix);
    }

    /// Set the channel-level default response timeout
    pub fn set_response_timeout(&self, timeout: Duration) {
        self.inner
            .response_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
    }

    fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.response_timeout_ms.load(Ordering::SeqCst))
    }

    /// Install the transform applied to every reconstructed remote error
    /// before it is delivered to the requester
    pub fn set_remote_error_hook<F, Fut>(&self, hook: F)
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Error> + Send + 'static,
    {
        let hook: RemoteErrorHook = Arc::new(move |err| Box::pin(hook(err)));
        if let Ok(mut slot) = self.inner.remote_error_hook.write() {
            *slot = Some(hook);
        }
    }

    async fn deliver_remote_error(&self, origin_stack: &str, error_value: Value) -> Error {
        let mut err = reconstruct(origin_stack, error_value);
        if self.inner.print_remote_rejections {
            if let Error::Remote(remote) = &err {
                tracing::error!(stack = %remote.stack, "remote rejection");
            }
        }
        let hook = self
            .inner
            .remote_error_hook
            .read()
            .ok()
            .and_then(|slot| slot.clone());
        if let Some(hook) = hook {
            err = hook(err).await;
        }
        err
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<()> {
        self.inner.transport.close().await
    }

    /// Whether the underlying transport reports itself closed
    pub fn is_closed(&self) -> bool {
        self.inner.transport.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }
}

fn wrap_handler<F, Fut, R>(handler: F) -> RequestCallback
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, Rejection>> + Send + 'static,
    R: Into<DeepValue> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |_name: String, data: Value, responder: Responder| {
        let future = handler(data);
        tokio::spawn(async move {
            match future.await {
                Ok(result) => {
                    let deep: DeepValue = result.into();
                    responder.respond(Ok(deep.resolve().await));
                }
                Err(rejection) => responder.respond(Err(rejection)),
            }
        });
    })
}

fn wrap_listener<F, Fut>(listener: F) -> EventCallback
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let listener = Arc::new(listener);
    Arc::new(move |_name, data| Box::pin(listener(data)))
}
