//! Conversion of JSON documents into template values.

use indexmap::IndexMap;
use mapsim_vtl::Value;
use serde_json::{Number, Value as JsonValue};

/// Convert a JSON value into the native value templates see.
///
/// Integers that fit a signed 64-bit value become `Int`; larger unsigned
/// integers keep their exact digits as a string. Objects keep key order.
pub fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_u64() {
                Value::String(n.to_string())
            } else {
                n.as_f64()
                    .map(Value::Float)
                    .unwrap_or_else(|| Value::String(n.to_string()))
            }
        }
        JsonValue::String(s) => Value::string(s.as_str()),
        JsonValue::Array(items) => Value::list(items.iter().map(json_to_value).collect()),
        JsonValue::Object(fields) => Value::map(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect::<IndexMap<String, Value>>(),
        ),
    }
}

/// Convert a string map into a template map.
pub fn string_map<'a>(entries: impl IntoIterator<Item = (&'a String, &'a String)>) -> Value {
    Value::map(
        entries
            .into_iter()
            .map(|(k, v)| (k.clone(), Value::string(v.as_str())))
            .collect(),
    )
}

/// Convert a template value back into JSON.
///
/// Non-finite floats become null and host objects their rendered text. A
/// list or map nested inside itself becomes its self-reference text.
pub fn value_to_json(value: &Value) -> JsonValue {
    to_json(value, &mut Vec::new())
}

fn to_json(value: &Value, open: &mut Vec<usize>) -> JsonValue {
    if let (Some(id), Some(text)) = (value.container_id(), value.self_reference_text()) {
        if open.contains(&id) {
            return JsonValue::String(text.to_string());
        }
        open.push(id);
    }

    let json = match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::List(items) => {
            JsonValue::Array(items.borrow().iter().map(|item| to_json(item, open)).collect())
        }
        Value::Map(fields) => JsonValue::Object(
            fields
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v, open)))
                .collect(),
        ),
        Value::Object(object) => JsonValue::String(object.render()),
    };

    if value.container_id().is_some() {
        open.pop();
    }
    json
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(json_to_value(&json!(null)), Value::Null);
        assert_eq!(json_to_value(&json!(42)), Value::Int(42));
        assert_eq!(json_to_value(&json!(5_000_000_000i64)), Value::Int(5_000_000_000));
        assert_eq!(json_to_value(&json!(1.5)), Value::Float(1.5));
        assert_eq!(json_to_value(&json!(u64::MAX)), Value::from("18446744073709551615"));
    }

    #[test]
    fn test_nested_preserves_order() {
        let value = json_to_value(&json!({"z": [1, {"a": true}], "b": "x"}));
        assert_eq!(value.render(), "{z=[1, {a=true}], b=x}");
    }

    #[test]
    fn test_back_to_json() {
        let original = json!({"z": [1, 2.5, null], "b": {"c": "x", "d": false}});
        assert_eq!(value_to_json(&json_to_value(&original)), original);
        assert_eq!(value_to_json(&Value::Float(f64::NAN)), JsonValue::Null);
    }

    #[test]
    fn test_self_reference_to_json() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(value_to_json(&list), json!([1, "(this Collection)"]));

        let shared = Value::list(vec![Value::Int(2)]);
        let twice = Value::list(vec![shared.clone(), shared]);
        assert_eq!(value_to_json(&twice), json!([[2], [2]]));
    }
}
