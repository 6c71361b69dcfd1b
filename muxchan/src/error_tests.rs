//! Tests for error handling and marshaling

use crate::error::{reconstruct, Error, Rejection, WireError};
use serde_json::{json, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::no_handler("test1");
        assert_eq!(err.to_string(), "No handler for request: test1");

        let err = Error::response_timeout("slow_op");
        assert_eq!(err.to_string(), "operation timed out");

        let err = Error::NotImplemented("send");
        assert_eq!(err.to_string(), "send is not implemented");

        let err = Error::NotImplemented("close");
        assert_eq!(err.to_string(), "close is not implemented");

        let err = Error::transport_msg("peer gone");
        assert_eq!(err.to_string(), "Transport layer error: peer gone");
    }

    #[test]
    fn test_error_wire_names() {
        assert_eq!(Error::transport_msg("err").name(), "TransportError");
        assert_eq!(Error::decode_msg("err").name(), "DecodeError");
        assert_eq!(Error::no_handler("op").name(), "NoHandlerError");
        assert_eq!(Error::response_timeout("op").name(), "TimeoutError");
        assert_eq!(Error::Rejected(json!(1)).name(), "RejectedError");
        assert_eq!(Error::ChannelClosed.name(), "ChannelClosedError");
    }

    #[test]
    fn test_error_with_source() {
        let parse_err = serde_json::from_str::<Value>("{nope").unwrap_err();
        let err = Error::decode("malformed inbound payload", parse_err);
        match err {
            Error::Decode { message, source } => {
                assert_eq!(message, "malformed inbound payload");
                assert!(source.is_some());
            }
            _ => panic!("Expected Decode error"),
        }
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let parse_err = serde_json::from_str::<Value>("not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(err.to_string().contains("JSON serialization failed"));
    }

    #[test]
    fn test_reconstruct_structured_record() {
        let wire = json!({
            "name": "Error",
            "message": "error with stacktrace",
            "stack": "    at remote_func (service.rs:12:9)",
        });
        let err = reconstruct("    at local_call_site (client.rs:3:5)", wire);
        match err {
            Error::Remote(remote) => {
                assert_eq!(remote.name, "Remote::Error");
                assert_eq!(remote.message, "error with stacktrace");
                assert!(remote.stack.contains("remote_func"));
                assert!(remote.stack.contains("From previous event:"));
                assert!(remote.stack.contains("local_call_site"));
                assert!(remote.extra.is_none());
            }
            other => panic!("Expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn test_reconstruct_no_handler_record() {
        let wire = serde_json::to_value(WireError::no_handler("test1")).unwrap();
        let err = reconstruct("", wire);
        match err {
            Error::NoHandler { request } => assert_eq!(request, "test1"),
            other => panic!("Expected NoHandler, got {other:?}"),
        }
    }

    #[test]
    fn test_reconstruct_raw_value_passthrough() {
        let err = reconstruct("origin", json!("foo"));
        match err {
            Error::Rejected(value) => assert_eq!(value, json!("foo")),
            other => panic!("Expected Rejected, got {other:?}"),
        }

        // An object without a stack field is not a wire-error record.
        let err = reconstruct("origin", json!({"message": "foo"}));
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[test]
    fn test_rejection_wire_value() {
        let wire = Rejection::Error(WireError::with_stack("Error", "boom", "at f"))
            .into_wire_value();
        assert_eq!(wire["name"], json!("Error"));
        assert_eq!(wire["message"], json!("boom"));
        assert_eq!(wire["stack"], json!("at f"));

        let raw = Rejection::Value(json!({"code": 7})).into_wire_value();
        assert_eq!(raw, json!({"code": 7}));
    }

    #[test]
    fn test_wire_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let wire = WireError::from_std(&io_err);
        assert_eq!(wire.name, "Error"); // std::io::Error's type name
        assert!(wire.message.contains("file not found"));
        assert!(!wire.stack.is_empty());
    }

    #[test]
    fn test_rejection_from_error() {
        let rejection: Rejection = Error::response_timeout("op").into();
        match rejection {
            Rejection::Error(wire) => {
                assert_eq!(wire.name, "TimeoutError");
                assert_eq!(wire.message, "operation timed out");
            }
            _ => panic!("Expected structured rejection"),
        }
    }
}
