//! JSON ↔ [`sse_core::Value`] conversion for the config surface.
//!
//! The config document is plain JSON (no custom wire format), so every
//! initializer, query literal, and metadata tag arrives as
//! `serde_json::Value` and is translated once at the compiler boundary.

use sse_core::{Map, Value};

/// Convert a JSON value into the engine's dynamic [`Value`].
///
/// JSON has no tuple/int-vs-float-preserving distinction beyond what
/// `serde_json::Number` already tracks, so JSON arrays always become
/// `Value::List` — callers that need a `Tuple` (e.g. for type-checking a
/// sampled value) construct it explicitly rather than through JSON.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(entries) => {
            let mut m = Map::new();
            for (k, v) in entries {
                m.insert(k.clone(), json_to_value(v));
            }
            Value::Map(m)
        }
    }
}
