//! Lossless JSON decoding driven by field directives.

use super::number::LosslessNumber;
use super::schema::{FieldDirective, Schema, SchemaRef};
use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decode a JSON document into a normalized value.
///
/// Every number is read exactly, then resolved against `schema`:
/// `Int64AsString` and `BigIntValue` fields become decimal strings, nested
/// fields are decoded with their child schema, and every other number is kept
/// only if it is exactly representable as a native `f64`.
///
/// When `array_key` is given the document must be an object holding an
/// array under that key; the decoded array is returned and `schema` applies
/// to each element.
pub fn parse(json: &str, schema: Option<&SchemaRef>, array_key: Option<&str>) -> CoreResult<Value> {
    let document: Value = serde_json::from_str(json)?;
    let schema = schema.map(|s| s.as_ref());

    let Some(key) = array_key else {
        return decode_value(document, schema, "");
    };

    let located = match document {
        Value::Object(mut envelope) => envelope.remove(key),
        _ => None,
    };
    match located {
        Some(Value::Array(items)) => decode_array(items, schema, key),
        Some(other) => Err(CoreError::type_mismatch(key, "array", describe(&other))),
        None => Err(CoreError::ShapeMismatch {
            key: key.to_string(),
            envelope: json.to_string(),
        }),
    }
}

/// Decode a JSON document into `T` using an explicit schema.
pub fn parse_with<T: DeserializeOwned>(
    json: &str,
    schema: Option<&SchemaRef>,
    array_key: Option<&str>,
) -> CoreResult<T> {
    let value = parse(json, schema, array_key)?;
    Ok(serde_json::from_value(value)?)
}

/// Decode a JSON document into `T` using `T`'s declared schema.
pub fn parse_as<T>(json: &str) -> CoreResult<T>
where
    T: super::LosslessDto + DeserializeOwned,
{
    parse_with(json, Some(&T::schema()), None)
}

/// Decode an array found under `array_key` into a `Vec<T>`.
pub fn parse_array<T>(json: &str, array_key: &str) -> CoreResult<Vec<T>>
where
    T: super::LosslessDto + DeserializeOwned,
{
    parse_with(json, Some(&T::schema()), Some(array_key))
}

fn decode_value(value: Value, schema: Option<&Schema>, path: &str) -> CoreResult<Value> {
    match value {
        Value::Object(map) => decode_object(map, schema, path).map(Value::Object),
        Value::Array(items) => decode_array(items, schema, path),
        Value::Number(n) => coerce_native(n, path),
        other => Ok(other),
    }
}

fn decode_array(items: Vec<Value>, schema: Option<&Schema>, path: &str) -> CoreResult<Value> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| decode_value(item, schema, &index_path(path, i)))
        .collect::<CoreResult<Vec<_>>>()
        .map(Value::Array)
}

fn decode_object(
    map: Map<String, Value>,
    schema: Option<&Schema>,
    path: &str,
) -> CoreResult<Map<String, Value>> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let field_path = field_path(path, &key);
        let decoded = match schema.and_then(|s| s.directive(&key)) {
            // Unannotated: structural pass-through, no directive context below
            None => decode_value(value, None, &field_path)?,
            Some(directive) => apply_directive(directive, value, &field_path)?,
        };
        out.insert(key, decoded);
    }
    Ok(out)
}

fn apply_directive(directive: &FieldDirective, value: Value, path: &str) -> CoreResult<Value> {
    use FieldDirective::*;

    match (directive, value) {
        (_, Value::Null) => Ok(Value::Null),

        (PlainNumber, Value::Number(n)) => coerce_native(n, path),
        (PlainNumber, other) => Err(CoreError::type_mismatch(path, "number", describe(&other))),

        (Int64AsString | BigIntValue, Value::Number(n)) => {
            integer_string(directive, &n, path).map(Value::String)
        }
        (Int64AsString | BigIntValue, Value::Array(_)) => Err(CoreError::TypeMismatch {
            path: path.to_string(),
            expected: "number".to_string(),
            actual: "array".to_string(),
            hint: Some(format!(
                "declare the field as {}Array for arrays",
                directive.name()
            )),
        }),
        (Int64AsString | BigIntValue, other) => {
            Err(CoreError::type_mismatch(path, "number", describe(&other)))
        }

        (Int64AsStringArray | BigIntValueArray, Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let item_path = index_path(path, i);
                match item {
                    Value::Number(n) => integer_string(directive, &n, &item_path).map(Value::String),
                    other => Err(CoreError::type_mismatch(
                        item_path,
                        "number",
                        describe(&other),
                    )),
                }
            })
            .collect::<CoreResult<Vec<_>>>()
            .map(Value::Array),
        (Int64AsStringArray | BigIntValueArray, other) => Err(CoreError::type_mismatch(
            path,
            "array of numbers",
            describe(&other),
        )),

        (Nested(child), Value::Object(map)) => {
            decode_object(map, Some(child), path).map(Value::Object)
        }
        (Nested(child), Value::Array(items)) => decode_array(items, Some(child), path),
        (Nested(child), other) => Err(CoreError::type_mismatch(
            path,
            format!("object ({})", child.name()),
            describe(&other),
        )),
    }
}

/// Exact decimal form of an integer literal under a 64-bit or big-integer directive.
fn integer_string(
    directive: &FieldDirective,
    number: &serde_json::Number,
    path: &str,
) -> CoreResult<String> {
    let literal = LosslessNumber::from(number);
    match directive {
        FieldDirective::BigIntValue | FieldDirective::BigIntValueArray => literal
            .to_bigint()
            .map(|b| b.to_string())
            .map_err(|_| CoreError::type_mismatch(path, "integer", literal.to_string())),
        _ if literal.is_integer() => Ok(literal.as_str().to_string()),
        _ => Err(CoreError::type_mismatch(path, "integer", literal.to_string())),
    }
}

fn coerce_native(number: serde_json::Number, path: &str) -> CoreResult<Value> {
    let literal = LosslessNumber::from(&number);
    if literal.is_safe() {
        Ok(Value::Number(number))
    } else {
        Err(CoreError::UnsafeNumber {
            path: display_path(path),
            literal: literal.to_string(),
        })
    }
}

pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn field_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Schema;
    use serde_json::json;

    fn job_schema() -> SchemaRef {
        let headers = Schema::builder("Headers").int64("correlationKey").build();
        Schema::builder("Job")
            .int64("key")
            .int64_array("relatedKeys")
            .bigint("amount")
            .bigint_array("amounts")
            .nested("customHeaders", headers)
            .build()
    }

    #[test]
    fn test_int64_field_keeps_exact_digits() {
        let schema = Schema::builder("Job").int64("key").build();
        let value = parse(r#"{"key": 9223372036854775807}"#, Some(&schema), None).unwrap();
        assert_eq!(value, json!({"key": "9223372036854775807"}));
    }

    #[test]
    fn test_unannotated_large_number_is_unsafe() {
        let err = parse(r#"{"key": 9223372036854775807}"#, None, None).unwrap_err();
        match err {
            CoreError::UnsafeNumber { path, literal } => {
                assert_eq!(path, "key");
                assert_eq!(literal, "9223372036854775807");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unsafe_number_reports_nested_path() {
        let err = parse(r#"{"a": {"b": [1, 9007199254740993]}}"#, None, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsafeNumber { ref path, .. } if path == "a.b[1]"
        ));
    }

    #[test]
    fn test_array_key_extraction() {
        let value = parse(r#"{"jobs":[{"key":1}]}"#, None, Some("jobs")).unwrap();
        assert_eq!(value, json!([{"key": 1}]));
    }

    #[test]
    fn test_missing_array_key_is_shape_mismatch() {
        let err = parse(r#"{"other":[]}"#, None, Some("jobs")).unwrap_err();
        match err {
            CoreError::ShapeMismatch { key, envelope } => {
                assert_eq!(key, "jobs");
                assert_eq!(envelope, r#"{"other":[]}"#);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_array_key_applies_schema_to_elements() {
        let schema = Schema::builder("Job").int64("key").build();
        let value = parse(
            r#"{"jobs":[{"key":2251799813685249},{"key":2251799813685250}]}"#,
            Some(&schema),
            Some("jobs"),
        )
        .unwrap();
        assert_eq!(
            value,
            json!([{"key": "2251799813685249"}, {"key": "2251799813685250"}])
        );
    }

    #[test]
    fn test_top_level_array_without_schema_is_opaque() {
        let value = parse(r#"[{"a":1},{"b":[true,null]}]"#, None, None).unwrap();
        assert_eq!(value, json!([{"a": 1}, {"b": [true, null]}]));
    }

    #[test]
    fn test_every_directive_kind() {
        let json = r#"{
            "key": 2251799813685249123,
            "relatedKeys": [1, 2251799813685249124],
            "amount": 123456789012345678901234567890,
            "amounts": [1, -2],
            "customHeaders": {"correlationKey": 9007199254740993, "name": "x"},
            "retries": 3
        }"#;
        let value = parse(json, Some(&job_schema()), None).unwrap();
        assert_eq!(
            value,
            json!({
                "key": "2251799813685249123",
                "relatedKeys": ["1", "2251799813685249124"],
                "amount": "123456789012345678901234567890",
                "amounts": ["1", "-2"],
                "customHeaders": {"correlationKey": "9007199254740993", "name": "x"},
                "retries": 3
            })
        );
    }

    #[test]
    fn test_int64_rejects_string_source() {
        let err = parse(r#"{"key": "123"}"#, Some(&job_schema()), None).unwrap_err();
        match err {
            CoreError::TypeMismatch {
                path,
                expected,
                actual,
                hint,
            } => {
                assert_eq!(path, "key");
                assert_eq!(expected, "number");
                assert_eq!(actual, "string");
                assert!(hint.is_none());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_scalar_directive_on_array_hints_array_directive() {
        let err = parse(r#"{"key": [1, 2]}"#, Some(&job_schema()), None).unwrap_err();
        match err {
            CoreError::TypeMismatch { hint, .. } => {
                assert!(hint.unwrap().contains("Int64AsStringArray"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_array_directive_rejects_non_array() {
        let err = parse(r#"{"relatedKeys": 5}"#, Some(&job_schema()), None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch { ref expected, .. } if expected == "array of numbers"
        ));

        let err = parse(r#"{"relatedKeys": [1, "2"]}"#, Some(&job_schema()), None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch { ref path, .. } if path == "relatedKeys[1]"
        ));
    }

    #[test]
    fn test_bigint_rejects_fraction() {
        let err = parse(r#"{"amount": 1.5}"#, Some(&job_schema()), None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch { ref expected, .. } if expected == "integer"
        ));
    }

    #[test]
    fn test_nested_directive_applies_to_array_elements() {
        let item = Schema::builder("Item").int64("id").build();
        let schema = Schema::builder("Order").nested("items", item).build();
        let value = parse(
            r#"{"items":[{"id":9223372036854775807},{"id":1}]}"#,
            Some(&schema),
            None,
        )
        .unwrap();
        assert_eq!(
            value,
            json!({"items": [{"id": "9223372036854775807"}, {"id": "1"}]})
        );
    }

    #[test]
    fn test_nested_directive_rejects_scalar() {
        let item = Schema::builder("Item").build();
        let schema = Schema::builder("Order").nested("items", item).build();
        let err = parse(r#"{"items": 3}"#, Some(&schema), None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch { ref expected, .. } if expected == "object (Item)"
        ));
    }

    #[test]
    fn test_unannotated_nested_object_has_no_directive_context() {
        // "key" is annotated at the top level only; the nested one is structural
        let schema = Schema::builder("Job").int64("key").build();
        let err = parse(
            r#"{"key": 1, "inner": {"key": 9223372036854775807}}"#,
            Some(&schema),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsafeNumber { ref path, .. } if path == "inner.key"
        ));
    }

    #[test]
    fn test_null_passes_through_directives() {
        let value = parse(
            r#"{"key": null, "relatedKeys": null}"#,
            Some(&job_schema()),
            None,
        )
        .unwrap();
        assert_eq!(value, json!({"key": null, "relatedKeys": null}));
    }

    #[test]
    fn test_plain_number_directive() {
        let schema = Schema::builder("Stats").plain("count").build();
        assert_eq!(
            parse(r#"{"count": 10}"#, Some(&schema), None).unwrap(),
            json!({"count": 10})
        );
        assert!(matches!(
            parse(r#"{"count": "10"}"#, Some(&schema), None).unwrap_err(),
            CoreError::TypeMismatch { .. }
        ));
        assert!(matches!(
            parse(r#"{"count": 18446744073709551615}"#, Some(&schema), None).unwrap_err(),
            CoreError::UnsafeNumber { .. }
        ));
    }

    #[test]
    fn test_root_number_path() {
        let err = parse("9007199254740993", None, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsafeNumber { ref path, .. } if path == "<root>"
        ));
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        assert!(matches!(
            parse("{not json", None, None).unwrap_err(),
            CoreError::Serialization(_)
        ));
    }
}
