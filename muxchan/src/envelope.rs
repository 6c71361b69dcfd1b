//! Wire envelope and payload codec
//!
//! One envelope is one routable unit: a request (`type` + `uuid`), a response
//! (`response`, echoing the request's `type`), or an event (`type` only).
//! Optional fields are elided on the wire.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single routable unit of the wire protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Event or request name; responses echo the original request's name
    #[serde(rename = "type")]
    pub kind: String,

    /// Arbitrary JSON payload
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    /// Correlation id, present only on outbound requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Correlation id being answered, present only on responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Present only on failed responses: a wire-error record or a raw value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Envelope {
    /// Build a request envelope
    pub fn request(name: impl Into<String>, data: Value, uuid: impl Into<String>) -> Self {
        Self {
            kind: name.into(),
            data,
            uuid: Some(uuid.into()),
            response: None,
            error: None,
        }
    }

    /// Build a response envelope answering `uuid`
    pub fn response(
        name: impl Into<String>,
        uuid: impl Into<String>,
        data: Value,
        error: Option<Value>,
    ) -> Self {
        Self {
            kind: name.into(),
            data,
            uuid: None,
            response: Some(uuid.into()),
            error,
        }
    }

    /// Build an event envelope
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self {
            kind: name.into(),
            data,
            uuid: None,
            response: None,
            error: None,
        }
    }

    /// Lenient extraction of an envelope from a decoded frame.
    ///
    /// A frame that is not an object or has no string `type` yields `None`
    /// and is ignored by the router; it is never a decode failure.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let kind = map.get("type")?.as_str()?.to_string();
        Some(Self {
            kind,
            data: map.get("data").cloned().unwrap_or(Value::Null),
            uuid: map
                .get("uuid")
                .and_then(Value::as_str)
                .map(str::to_string),
            response: map
                .get("response")
                .and_then(Value::as_str)
                .map(str::to_string),
            error: map.get("error").filter(|v| !v.is_null()).cloned(),
        })
    }
}

/// What the transport moves: JSON text, or a structured value when the
/// channel is configured for raw passthrough.
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Object(Value),
}

/// Encode an envelope into a transmissible payload
pub fn encode(envelope: &Envelope, raw: bool) -> Result<Payload> {
    if raw {
        Ok(Payload::Object(serde_json::to_value(envelope)?))
    } else {
        Ok(Payload::Text(serde_json::to_string(envelope)?))
    }
}

/// Encode an arbitrary value as a bare frame, outside the envelope protocol
pub fn encode_raw(value: &Value, raw: bool) -> Result<Payload> {
    if raw {
        Ok(Payload::Object(value.clone()))
    } else {
        Ok(Payload::Text(serde_json::to_string(value)?))
    }
}

/// Decode an inbound payload into a JSON frame
pub fn decode(payload: &Payload) -> Result<Value> {
    match payload {
        Payload::Text(text) => {
            serde_json::from_str(text).map_err(|e| Error::decode("malformed inbound payload", e))
        }
        Payload::Object(value) => Ok(value.clone()),
    }
}
