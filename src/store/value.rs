use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

/// Field map stored in a document.
pub type DocumentData = BTreeMap<String, Value>;

/// Resolves a dotted field path (`"a.b.c"`) inside `data`.
pub fn lookup_field<'a>(data: &'a DocumentData, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Orders values of the same kind; mixed kinds order by type
/// (null < bool < number < string). Arrays and objects are incomparable.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(_), _) | (_, Value::Array(_)) => None,
        (Value::Object(_), _) | (_, Value::Object(_)) => None,
        _ => Some(type_order(left).cmp(&type_order(right))),
    }
}

fn type_order(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> DocumentData {
        value
            .as_object()
            .unwrap()
            .clone()
            .into_iter()
            .collect()
    }

    #[test]
    fn looks_up_nested_fields() {
        let doc = data(json!({"location": {"lat": 1.5}, "uuid": "a"}));
        assert_eq!(lookup_field(&doc, "location.lat"), Some(&json!(1.5)));
        assert_eq!(lookup_field(&doc, "uuid"), Some(&json!("a")));
        assert_eq!(lookup_field(&doc, "location.lng"), None);
        assert_eq!(lookup_field(&doc, "uuid.inner"), None);
    }

    #[test]
    fn compares_numbers_across_representations() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(null), &json!(3)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!([1]), &json!([1])), None);
    }
}
