use std::collections::HashMap;

use serde_json::Number;

use crate::value::Value;

/// Render a value as template output.
///
/// Null renders as the empty string, scalars via `Display` (floats in their
/// shortest round-trip form), and arrays/maps as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Str(s) => s.clone(),
        Value::Array(_) | Value::Map(_) => to_json(value).to_string(),
        Value::Object(obj) => obj.type_name().to_string(),
        Value::Function(func) => format!("fn({})", func.params.join(", ")),
    }
}

/// Convert a value into JSON for host interop. Host objects and closures
/// have no JSON form and become null.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Float(n) => Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => {
            // serde_json's map keeps keys sorted, which makes rendered
            // output deterministic
            let entries = map
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<serde_json::Map<_, _>>();
            serde_json::Value::Object(entries)
        }
        Value::Object(_) | Value::Function(_) => serde_json::Value::Null,
    }
}

/// Convert parsed JSON into an engine value. Whole numbers become
/// integers, everything else maps structurally.
pub fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(entries) => {
            let map = entries
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<HashMap<_, _>>();
            Value::Map(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_renders_empty() {
        assert_eq!(stringify(&Value::Null), "");
    }

    #[test]
    fn floats_render_shortest() {
        assert_eq!(stringify(&Value::Float(6.2)), "6.2");
        assert_eq!(stringify(&Value::Float(0.5)), "0.5");
    }

    #[test]
    fn json_round_trip_keeps_integers() {
        let value = from_json(serde_json::json!({"a": 1, "b": [1.5, "x"]}));
        let Value::Map(map) = &value else {
            panic!("expected map");
        };
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(to_json(&value).to_string(), r#"{"a":1,"b":[1.5,"x"]}"#);
    }
}
