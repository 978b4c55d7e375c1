use serde::Serialize;
use serde_json::Value;

/// Whether `live` is `desired` plus whatever the API server or a controller filled in. Fields
/// that are unset in `desired` (null, empty strings, empty lists and empty maps) are ignored,
/// everything else has to match. Lists have to have the same length.
pub fn is_semantic_derivative(desired: &Value, live: &Value) -> bool {
    match desired {
        Value::Null => true,
        Value::String(s) if s.is_empty() => true,
        Value::Array(a) if a.is_empty() => true,
        Value::Object(o) if o.is_empty() => true,
        Value::Array(desired_items) => match live {
            Value::Array(live_items) => {
                desired_items.len() == live_items.len()
                    && desired_items
                        .iter()
                        .zip(live_items)
                        .all(|(d, l)| is_semantic_derivative(d, l))
            }
            _ => false,
        },
        Value::Object(desired_fields) => match live {
            Value::Object(live_fields) => desired_fields.iter().all(|(key, d)| {
                is_semantic_derivative(d, live_fields.get(key).unwrap_or(&Value::Null))
            }),
            _ => false,
        },
        scalar => scalar == live,
    }
}

/// [`is_semantic_derivative`] over the JSON form of two values. Values that cannot be serialized
/// are never equal.
pub fn semantic_derivative<T: Serialize>(desired: &T, live: &T) -> bool {
    match (serde_json::to_value(desired), serde_json::to_value(live)) {
        (Ok(desired), Ok(live)) => is_semantic_derivative(&desired, &live),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_fields_are_ignored() {
        let desired = json!({"a": 1, "b": null, "c": "", "d": [], "e": {}});
        let live = json!({"a": 1, "b": "defaulted", "c": "x", "d": [1], "e": {"f": 1}, "g": 2});
        assert!(is_semantic_derivative(&desired, &live));
    }

    #[test]
    fn set_fields_must_match() {
        assert!(!is_semantic_derivative(
            &json!({"numCPUs": 2}),
            &json!({"numCPUs": 4})
        ));
        assert!(!is_semantic_derivative(&json!({"a": "b"}), &json!({})));
        assert!(!is_semantic_derivative(&json!([1, 2]), &json!([1])));
        assert!(is_semantic_derivative(
            &json!([{"a": 1}]),
            &json!([{"a": 1, "b": 2}])
        ));
        assert!(!is_semantic_derivative(&json!(false), &json!(true)));
    }
}
