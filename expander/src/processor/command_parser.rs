//! Command envelope parsing.
//!
//! Envelopes look like
//! `{"action": "add", "payload": {"item": {...}, "id": "42", "type": "node",
//! "database": "chef", "enqueued_at": 1300000000}}`.

use chrono::{DateTime, Utc};
use expander_shared::{IndexAction, IndexCommand, ObjectIdentity};
use serde_json::{Map, Value};
use tracing::error;

const ACTION: &str = "action";
const PAYLOAD: &str = "payload";
const ITEM: &str = "item";
const ID: &str = "id";
const TYPE: &str = "type";
const DATABASE: &str = "database";
const ENQUEUED_AT: &str = "enqueued_at";

/// Decode a raw envelope.
///
/// Never fails: input that is not a JSON object is logged and turned into a
/// `Skip` command.
pub fn parse(raw: &[u8]) -> IndexCommand {
    let envelope = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(envelope)) => envelope,
        Ok(other) => {
            error!(
                message = %String::from_utf8_lossy(raw),
                kind = json_kind(&other),
                "cannot index object because the envelope is not a JSON object"
            );
            return IndexCommand::skip();
        }
        Err(e) => {
            error!(
                message = %String::from_utf8_lossy(raw),
                error = %e,
                "cannot index object because it is invalid JSON"
            );
            return IndexCommand::skip();
        }
    };

    let action = match envelope.get(ACTION) {
        Some(Value::String(action)) => IndexAction::from_wire(action),
        Some(other) => IndexAction::Unknown(other.to_string()),
        None => IndexAction::Unknown(Value::Null.to_string()),
    };

    let mut command = IndexCommand {
        action,
        ..IndexCommand::skip()
    };

    if let Some(Value::Object(payload)) = envelope.get(PAYLOAD) {
        command.identity = ObjectIdentity {
            id: string_field(payload, ID),
            object_type: string_field(payload, TYPE),
            database: string_field(payload, DATABASE),
        };
        command.enqueued_at = payload.get(ENQUEUED_AT).and_then(timestamp);
        command.item = payload.get(ITEM).filter(|item| !item.is_null()).cloned();
    }

    command
}

/// Read an identity field; numbers are accepted and stringified.
fn string_field(payload: &Map<String, Value>, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// UNIX seconds, integer or fractional.
fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(seconds) = value.as_i64() {
        return DateTime::from_timestamp(seconds, 0);
    }
    let seconds = value.as_f64()?;
    DateTime::from_timestamp_millis((seconds * 1000.0) as i64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
