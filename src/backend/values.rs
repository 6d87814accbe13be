// SPDX-License-Identifier: MPL-2.0

//! Conversion between Firestore's typed REST values and plain JSON.

use chrono::DateTime;
use serde_json::{Map, Value, json};

/// Decode one typed value (`{"stringValue": "..."}` etc.) into plain JSON.
/// Timestamps become `{"seconds", "nanoseconds"}` objects, the same shape
/// the client SDKs expose.
pub fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };

    if let Some(s) = obj.get("stringValue") {
        return s.clone();
    }
    if let Some(b) = obj.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = obj.get("integerValue") {
        // int64 values are sent as strings
        return match i {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        };
    }
    if let Some(d) = obj.get("doubleValue") {
        return d.clone();
    }
    if let Some(ts) = obj.get("timestampValue") {
        return ts
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| {
                json!({
                    "seconds": dt.timestamp(),
                    "nanoseconds": dt.timestamp_subsec_nanos(),
                })
            })
            .unwrap_or(Value::Null);
    }
    if let Some(array) = obj.get("arrayValue") {
        let values = array
            .get("values")
            .and_then(Value::as_array)
            .map(|vs| vs.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(map) = obj.get("mapValue") {
        return Value::Object(decode_fields(map.get("fields")));
    }
    if let Some(r) = obj.get("referenceValue").or_else(|| obj.get("bytesValue")) {
        return r.clone();
    }
    if let Some(geo) = obj.get("geoPointValue") {
        return geo.clone();
    }
    Value::Null
}

fn decode_fields(fields: Option<&Value>) -> Map<String, Value> {
    fields
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(name, v)| (name.clone(), decode_value(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode a REST document into plain JSON with its id under `"id"`.
/// Returns `None` when the document has no name.
pub fn decode_document(doc: &Value) -> Option<Value> {
    let name = doc.get("name")?.as_str()?;
    let id = name.rsplit('/').next().filter(|id| !id.is_empty())?;

    let mut fields = decode_fields(doc.get("fields"));
    fields.insert("id".to_string(), Value::String(id.to_string()));
    Some(Value::Object(fields))
}

pub fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

pub fn integer_value(i: i64) -> Value {
    json!({ "integerValue": i.to_string() })
}
