//! Normalization of the shared plugin results artifact.
//!
//! Plugins append `{plugin, historical, data}` records to a property list.
//! Plist types with no JSON counterpart are flattened: dates become RFC 3339
//! UTC strings, data blobs become base64, UIDs become integers.

use std::io::Cursor;
use std::time::SystemTime;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Parse the artifact into a list of JSON records.
///
/// A top-level value that is not an array is wrapped in a one-element list.
///
/// # Errors
///
/// Returns the plist parser's error if `bytes` is not a property list.
pub fn parse_plugin_results(bytes: &[u8]) -> Result<Vec<Value>, plist::Error> {
    let value = plist::Value::from_reader(Cursor::new(bytes))?;
    Ok(match normalize(value) {
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Convert a plist value into plain JSON.
#[must_use]
pub fn normalize(value: plist::Value) -> Value {
    match value {
        plist::Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        plist::Value::Dictionary(dict) => {
            Value::Object(dict.into_iter().map(|(k, v)| (k, normalize(v))).collect())
        }
        plist::Value::Boolean(b) => Value::Bool(b),
        plist::Value::String(s) => Value::String(s),
        plist::Value::Integer(i) => i
            .as_signed()
            .map(Value::from)
            .or_else(|| i.as_unsigned().map(Value::from))
            .unwrap_or(Value::Null),
        plist::Value::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        plist::Value::Date(d) => Value::String(
            DateTime::<Utc>::from(SystemTime::from(d)).to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        plist::Value::Data(bytes) => Value::String(STANDARD.encode(bytes)),
        plist::Value::Uid(uid) => Value::from(uid.get()),
        _ => Value::Null,
    }
}
