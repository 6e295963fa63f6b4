//! Frame wire format.
//!
//! Frames travel as compact JSON in struct field order. The pretty form with
//! sorted keys is for preview logging only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors from encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Header of a frame.
///
/// Optional fields are always present on the wire, as `null` when unset.
/// Decoding accepts either `null` or a missing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub sender_id: String,
    pub receiver_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message_id: String,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub status: Option<String>,
}

/// One typed entry of a frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload {
    pub datatype: String,
    pub value: String,
    pub slug: String,
}

impl Payload {
    pub fn new(
        datatype: impl Into<String>,
        value: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            datatype: datatype.into(),
            value: value.into(),
            slug: slug.into(),
        }
    }
}

/// A structured message unit sent to one or more servers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub metadata: Metadata,
    pub payload: Vec<Payload>,
}

impl Frame {
    /// Serializes the frame to its canonical compact form.
    ///
    /// This is the exact text transmitted over a session.
    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Renders an indented, key-sorted form for human preview.
    ///
    /// Never used on the wire.
    pub fn to_pretty_json(&self) -> Result<String, FrameError> {
        let value = sort_keys(serde_json::to_value(self)?);
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Decodes a frame from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Rebuilds every object with its keys in lexicographic order.
///
/// `serde_json::Map` only sorts when `preserve_order` is off, and feature
/// unification elsewhere in a build can turn it on.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame {
            metadata: Metadata {
                sender_id: "device-a".into(),
                receiver_id: Some("device-b".into()),
                timestamp: 1_734_500_000_123,
                message_id: "6f1c2a0e-0000-4000-8000-000000000001".into(),
                msg_type: "event".into(),
                status: None,
            },
            payload: vec![
                Payload::new("string", "hello", "greeting"),
                Payload::new("int", "42", "answer"),
            ],
        }
    }

    #[test]
    fn compact_json_has_no_whitespace() {
        let json = sample_frame().to_json().unwrap();
        assert!(!json.contains('\n'));
        assert!(!json.contains(": "));
        assert!(json.starts_with(r#"{"metadata":{"senderId":"device-a""#));
    }

    #[test]
    fn compact_json_uses_wire_field_names() {
        let json = sample_frame().to_json().unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["metadata"]["receiverId"], "device-b");
        assert_eq!(v["metadata"]["messageId"], "6f1c2a0e-0000-4000-8000-000000000001");
        assert_eq!(v["metadata"]["type"], "event");
        assert_eq!(v["metadata"]["timestamp"], 1_734_500_000_123_i64);
        assert!(v["metadata"]["status"].is_null());
        assert_eq!(v["payload"][1]["slug"], "answer");
    }

    #[test]
    fn decode_restores_metadata_and_payload_order() {
        let frame = sample_frame();
        let decoded = Frame::from_json(&frame.to_json().unwrap()).unwrap();
        assert_eq!(decoded.metadata, frame.metadata);
        let triples: Vec<_> = decoded
            .payload
            .iter()
            .map(|p| (p.datatype.as_str(), p.value.as_str(), p.slug.as_str()))
            .collect();
        assert_eq!(
            triples,
            vec![("string", "hello", "greeting"), ("int", "42", "answer")]
        );
    }

    #[test]
    fn decode_accepts_missing_optional_keys() {
        let text = r#"{"metadata":{"senderId":"s","timestamp":1,"messageId":"m","type":"t"},"payload":[]}"#;
        let frame = Frame::from_json(text).unwrap();
        assert!(frame.metadata.receiver_id.is_none());
        assert!(frame.metadata.status.is_none());
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn decode_rejects_missing_sender() {
        let text = r#"{"metadata":{"timestamp":1,"messageId":"m","type":"t"},"payload":[]}"#;
        assert!(matches!(Frame::from_json(text), Err(FrameError::Json(_))));
    }

    #[test]
    fn pretty_json_sorts_keys() {
        let pretty = sample_frame().to_pretty_json().unwrap();
        assert!(pretty.contains('\n'));
        let message_id = pretty.find("\"messageId\"").unwrap();
        let receiver_id = pretty.find("\"receiverId\"").unwrap();
        let sender_id = pretty.find("\"senderId\"").unwrap();
        let timestamp = pretty.find("\"timestamp\"").unwrap();
        assert!(message_id < receiver_id);
        assert!(receiver_id < sender_id);
        assert!(sender_id < timestamp);
        // "datatype" < "slug" < "value" inside payload entries.
        let datatype = pretty.find("\"datatype\"").unwrap();
        let slug = pretty.find("\"slug\"").unwrap();
        let value = pretty.find("\"value\"").unwrap();
        assert!(datatype < slug && slug < value);
    }

    #[test]
    fn pretty_and_compact_decode_to_same_frame() {
        let frame = sample_frame();
        let a = Frame::from_json(&frame.to_json().unwrap()).unwrap();
        let b = Frame::from_json(&frame.to_pretty_json().unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
