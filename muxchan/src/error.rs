//! Error types for the muxchan library

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::backtrace::Backtrace;
use thiserror::Error;

/// Main error type for muxchan operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport layer errors
    #[error("Transport layer error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A transport operation the underlying provider does not support
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// Malformed inbound payload
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization and deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A request was sent to a name with no registered handler
    #[error("No handler for request: {request}")]
    NoHandler { request: String },

    /// A handler on the far side failed with a structured error
    #[error(transparent)]
    Remote(RemoteError),

    /// A handler on the far side rejected with a raw non-error value
    #[error("Remote rejection: {0}")]
    Rejected(Value),

    /// No response arrived within the configured window
    #[error("operation timed out")]
    ResponseTimeout { request: String },

    /// The channel or its transport has been closed
    #[error("channel closed")]
    ChannelClosed,
}

impl Error {
    /// Create a transport error with source
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport error without source
    pub fn transport_msg(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error with source
    pub fn decode<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Decode {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a decode error without source
    pub fn decode_msg(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Create a serialization error with source
    pub fn serialization<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a serialization error without source
    pub fn serialization_msg(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Create a no-handler error
    pub fn no_handler(request: impl Into<String>) -> Self {
        Self::NoHandler {
            request: request.into(),
        }
    }

    /// Create a response timeout error
    pub fn response_timeout(request: impl Into<String>) -> Self {
        Self::ResponseTimeout {
            request: request.into(),
        }
    }

    /// Get the wire name of this error kind
    pub fn name(&self) -> &'static str {
        match self {
            Error::Transport { .. } => "TransportError",
            Error::NotImplemented(_) => "NotImplementedError",
            Error::Decode { .. } => "DecodeError",
            Error::Serialization { .. } => "SerializationError",
            Error::NoHandler { .. } => "NoHandlerError",
            Error::Remote(_) => "RemoteError",
            Error::Rejected(_) => "RejectedError",
            Error::ResponseTimeout { .. } => "TimeoutError",
            Error::ChannelClosed => "ChannelClosedError",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization("JSON serialization failed", err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::transport("Task join failed", err)
    }
}

/// Result type for muxchan operations
pub type Result<T> = std::result::Result<T, Error>;

/// A failure reconstructed from the remote side of the channel.
///
/// The `name` keeps the remote error's name behind a `Remote::` marker so a
/// remote `Error` is never confused with a local one, and the `stack` stitches
/// the remote stack onto the local call-site stack captured at request-send
/// time, so a single trace spans both sides of the boundary.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub name: String,
    pub message: String,
    pub stack: String,
    pub extra: Option<Value>,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// The transmissible form of a structured error: what travels in an
/// envelope's `error` field when a handler fails with a real error value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub name: String,
    pub message: String,
    pub stack: String,
}

impl WireError {
    /// Create a wire error with name `Error` and a stack captured here
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "Error".to_string(),
            message: message.into(),
            stack: Backtrace::force_capture().to_string(),
        }
    }

    /// Create a wire error with an explicit name and stack
    pub fn with_stack(
        name: impl Into<String>,
        message: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: stack.into(),
        }
    }

    /// Create a wire error from any std error, named after its type
    pub fn from_std<E>(err: &E) -> Self
    where
        E: std::error::Error,
    {
        let type_name = std::any::type_name::<E>();
        let name = type_name.rsplit("::").next().unwrap_or(type_name);
        Self {
            name: name.to_string(),
            message: err.to_string(),
            stack: Backtrace::force_capture().to_string(),
        }
    }

    pub(crate) fn no_handler(request: &str) -> Self {
        Self {
            name: "NoHandlerError".to_string(),
            message: format!("No handler for request: {request}"),
            stack: Backtrace::force_capture().to_string(),
        }
    }
}

/// What a request handler fails with.
///
/// `Error` carries a structured wire record that the requester reconstructs
/// into a [`RemoteError`]; `Value` is passed through to the requester
/// unchanged, with no stack stitching.
#[derive(Debug)]
pub enum Rejection {
    Error(WireError),
    Value(Value),
}

impl Rejection {
    /// The value placed in the response envelope's `error` field
    pub fn into_wire_value(self) -> Value {
        match self {
            Rejection::Error(wire) => serde_json::to_value(&wire).unwrap_or(Value::Null),
            Rejection::Value(value) => value,
        }
    }
}

impl From<WireError> for Rejection {
    fn from(wire: WireError) -> Self {
        Rejection::Error(wire)
    }
}

impl From<Value> for Rejection {
    fn from(value: Value) -> Self {
        Rejection::Value(value)
    }
}

impl From<Error> for Rejection {
    fn from(err: Error) -> Self {
        Rejection::Error(WireError {
            name: err.name().to_string(),
            message: err.to_string(),
            stack: Backtrace::force_capture().to_string(),
        })
    }
}

const STACK_STITCH_MARKER: &str = "From previous event:";

/// Rebuild a local error from a response envelope's `error` field.
///
/// A value shaped like a wire-error record becomes a [`RemoteError`] (or
/// [`Error::NoHandler`] for the protocol's own no-handler rejection); any
/// other value is delivered unchanged as [`Error::Rejected`].
pub fn reconstruct(origin_stack: &str, error_value: Value) -> Error {
    let record = match &error_value {
        Value::Object(map)
            if map.get("message").map_or(false, Value::is_string)
                && map.get("stack").map_or(false, Value::is_string) =>
        {
            serde_json::from_value::<WireError>(error_value.clone()).ok()
        }
        _ => None,
    };

    match record {
        Some(wire) if wire.name == "NoHandlerError" => {
            let request = wire
                .message
                .strip_prefix("No handler for request: ")
                .unwrap_or(&wire.message)
                .to_string();
            Error::NoHandler { request }
        }
        Some(wire) => Error::Remote(RemoteError {
            name: format!("Remote::{}", wire.name),
            message: wire.message,
            stack: format!("{}\n{STACK_STITCH_MARKER}\n{origin_stack}", wire.stack),
            extra: None,
        }),
        None => Error::Rejected(error_value),
    }
}
