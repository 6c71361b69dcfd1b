//! # muxchan - multiplexed request/response and pub/sub channel
//!
//! A bidirectional message-channel abstraction that turns any duplex
//! transport (a socket, a worker port, a pipe) into a typed request/response
//! + publish/subscribe protocol. One channel multiplexes many correlated
//! request/response exchanges and many independent event streams over a
//! single connection, and reconstructs remote failures as local error values
//! with the remote stack stitched onto the local call site.
//!
//! ## Quick Start
//!
//! ### Request/Response Pattern
//!
//! ```rust,ignore
//! use muxchan::{transport, Channel, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (client_end, server_end) = transport::pair();
//!     let client = Channel::new(client_end);
//!     let server = Channel::new(server_end);
//!
//!     server.on_request("add", |params| async move {
//!         let (a, b) = (params["a"].as_i64().unwrap_or(0), params["b"].as_i64().unwrap_or(0));
//!         Ok(a + b)
//!     });
//!
//!     let sum = client.send_request("add", json!({"a": 10, "b": 5})).await?;
//!     assert_eq!(sum, json!(15));
//!     Ok(())
//! }
//! ```
//!
//! ### Publish/Subscribe Pattern
//!
//! ```rust,ignore
//! use muxchan::{transport, Channel, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (publisher_end, subscriber_end) = transport::pair();
//!     let publisher = Channel::new(publisher_end);
//!     let subscriber = Channel::new(subscriber_end);
//!
//!     subscriber.on_event("temperature", |data| async move {
//!         println!("reading: {data}");
//!         Ok(())
//!     });
//!
//!     publisher.send_event("temperature", json!({"value": 25.3})).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Scopes
//!
//! Independent logical sub-channels share one transport without name
//! collisions:
//!
//! ```rust,ignore
//! let editor = channel.scope("editor");
//! editor.on_event("saved", |data| async move { Ok(()) });
//! editor.send_event("saved", serde_json::json!({"path": "a.txt"})).await?;
//! editor.destroy(); // removes only this scope's listeners
//! ```

pub mod channel;
pub mod envelope;
pub mod error;
pub mod scope;
pub mod transport;
pub mod value;

mod pending;
mod registry;


#[cfg(test)]
mod error_tests;

// Re-exports
pub use channel::{Channel, ChannelOptions, RequestOptions, Responder};
pub use envelope::{Envelope, Payload};
pub use error::{Error, Rejection, RemoteError, Result, WireError};
pub use registry::ListenerId;
pub use scope::ScopedChannel;
pub use transport::{pair, MemoryTransport, Transport};
pub use value::DeepValue;

// Re-export commonly used dependencies
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use serde_json::{json, Value};
