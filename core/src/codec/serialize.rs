//! Lossless JSON encoding driven by field directives.

use super::number::LosslessNumber;
use super::parse::{describe, field_path, index_path};
use super::schema::{FieldDirective, Schema, SchemaRef};
use crate::error::{CoreError, CoreResult};
use serde::ser::{self, Impossible, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Struct names of date and time types that have no agreed JSON form.
const TEMPORAL_TYPES: &[&str] = &["SystemTime"];

/// Whether text rendered through `collect_str` is a date, time or timestamp,
/// as chrono's types render themselves.
fn is_temporal_literal(text: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

    DateTime::parse_from_rfc3339(text).is_ok()
        || text.parse::<NaiveDateTime>().is_ok()
        || text.parse::<NaiveDate>().is_ok()
        || text.parse::<NaiveTime>().is_ok()
}

/// Encode `value` using its declared schema.
pub fn serialize<T>(value: &T) -> CoreResult<String>
where
    T: super::LosslessDto + Serialize,
{
    serialize_with(value, Some(&T::schema()))
}

/// Encode `value` with an explicit schema.
///
/// Fields directed `Int64AsString` or `BigIntValue` (and their array forms)
/// are written as bare JSON integers even when the Rust value holds them as
/// strings; everything else is written structurally.
pub fn serialize_with<T>(value: &T, schema: Option<&SchemaRef>) -> CoreResult<String>
where
    T: Serialize + ?Sized,
{
    let wire = to_wire_value(value, schema)?;
    Ok(serde_json::to_string(&wire)?)
}

/// Build the wire form of `value` without rendering it to text.
pub fn to_wire_value<T>(value: &T, schema: Option<&SchemaRef>) -> CoreResult<Value>
where
    T: Serialize + ?Sized,
{
    value
        .serialize(Inspector)
        .map_err(|Rejected(reason)| CoreError::UnsupportedType(reason))?;

    let value = serde_json::to_value(value)?;
    match schema {
        Some(schema) if !schema.is_empty() => rewrap_value(value, schema, ""),
        _ => Ok(value),
    }
}

fn rewrap_value(value: Value, schema: &Schema, path: &str) -> CoreResult<Value> {
    match value {
        Value::Object(map) => rewrap_object(map, schema, path).map(Value::Object),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| rewrap_value(item, schema, &index_path(path, i)))
            .collect::<CoreResult<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn rewrap_object(
    map: Map<String, Value>,
    schema: &Schema,
    path: &str,
) -> CoreResult<Map<String, Value>> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let wire = match schema.directive(&key) {
            Some(directive) => rewrap_field(directive, value, &field_path(path, &key))?,
            None => value,
        };
        out.insert(key, wire);
    }
    Ok(out)
}

fn rewrap_field(directive: &FieldDirective, value: Value, path: &str) -> CoreResult<Value> {
    use FieldDirective::*;

    match (directive, value) {
        (_, Value::Null) => Ok(Value::Null),
        (PlainNumber, value) => Ok(value),
        (Int64AsString | BigIntValue, value) => bare_integer(value, path),
        (Int64AsStringArray | BigIntValueArray, Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| bare_integer(item, &index_path(path, i)))
            .collect::<CoreResult<Vec<_>>>()
            .map(Value::Array),
        (Int64AsStringArray | BigIntValueArray, other) => Err(CoreError::type_mismatch(
            path,
            "array of integers",
            describe(&other),
        )),
        (Nested(child), value @ (Value::Object(_) | Value::Array(_))) => {
            rewrap_value(value, child, path)
        }
        (Nested(child), other) => Err(CoreError::type_mismatch(
            path,
            format!("object ({})", child.name()),
            describe(&other),
        )),
    }
}

fn bare_integer(value: Value, path: &str) -> CoreResult<Value> {
    match value {
        Value::Number(n) => Ok(Value::Number(n)),
        Value::String(text) => {
            let literal = LosslessNumber::parse(&text)
                .ok()
                .filter(LosslessNumber::is_integer)
                .ok_or_else(|| {
                    CoreError::type_mismatch(path, "integer string", format!("'{text}'"))
                })?;
            Ok(Value::Number(literal.to_number()))
        }
        other => Err(CoreError::type_mismatch(
            path,
            "integer string",
            describe(&other),
        )),
    }
}

/// Reason a value was refused before encoding.
#[derive(Debug)]
struct Rejected(String);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Rejected {}

impl ser::Error for Rejected {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Rejected(msg.to_string())
    }
}

/// Walks a value through serde without producing output, refusing date
/// types and maps whose keys are not strings.
///
/// Sets serialize as sequences and cannot be told apart from `Vec`; they
/// are written as JSON arrays.
#[derive(Clone, Copy)]
struct Inspector;

type Checked = Result<(), Rejected>;

impl ser::Serializer for Inspector {
    type Ok = ();
    type Error = Rejected;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Checked {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> Checked {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> Checked {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> Checked {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> Checked {
        Ok(())
    }
    fn serialize_i128(self, _: i128) -> Checked {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> Checked {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> Checked {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> Checked {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> Checked {
        Ok(())
    }
    fn serialize_u128(self, _: u128) -> Checked {
        Ok(())
    }
    fn serialize_f32(self, _: f32) -> Checked {
        Ok(())
    }
    fn serialize_f64(self, _: f64) -> Checked {
        Ok(())
    }
    fn serialize_char(self, _: char) -> Checked {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> Checked {
        Ok(())
    }
    fn collect_str<T: ?Sized + fmt::Display>(self, value: &T) -> Checked {
        let text = value.to_string();
        if is_temporal_literal(&text) {
            return Err(Rejected(format!(
                "date or time value '{text}' has no lossless JSON form; \
                 convert it to a string or epoch number first"
            )));
        }
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> Checked {
        Ok(())
    }
    fn serialize_none(self) -> Checked {
        Ok(())
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Checked {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Checked {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Checked {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self, Rejected> {
        Ok(self)
    }
    fn serialize_tuple(self, _: usize) -> Result<Self, Rejected> {
        Ok(self)
    }
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, Rejected> {
        Ok(self)
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, Rejected> {
        Ok(self)
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self, Rejected> {
        Ok(self)
    }
    fn serialize_struct(self, name: &'static str, _: usize) -> Result<Self, Rejected> {
        if TEMPORAL_TYPES.contains(&name) {
            return Err(Rejected(format!(
                "{name} has no lossless JSON form; convert it to a string or epoch number first"
            )));
        }
        Ok(self)
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, Rejected> {
        Ok(self)
    }
}

impl ser::SerializeSeq for Inspector {
    type Ok = ();
    type Error = Rejected;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(Inspector)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTuple for Inspector {
    type Ok = ();
    type Error = Rejected;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(Inspector)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Inspector {
    type Ok = ();
    type Error = Rejected;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(Inspector)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Inspector {
    type Ok = ();
    type Error = Rejected;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(Inspector)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeMap for Inspector {
    type Ok = ();
    type Error = Rejected;
    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Checked {
        key.serialize(KeyInspector)
    }
    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(Inspector)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStruct for Inspector {
    type Ok = ();
    type Error = Rejected;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(Inspector)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Inspector {
    type Ok = ();
    type Error = Rejected;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(Inspector)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

/// Accepts only string-like map keys.
struct KeyInspector;

fn non_string_key(kind: &str) -> Rejected {
    Rejected(format!(
        "map keyed by {kind} has no lossless JSON form; use string keys"
    ))
}

impl ser::Serializer for KeyInspector {
    type Ok = ();
    type Error = Rejected;
    type SerializeSeq = Impossible<(), Rejected>;
    type SerializeTuple = Impossible<(), Rejected>;
    type SerializeTupleStruct = Impossible<(), Rejected>;
    type SerializeTupleVariant = Impossible<(), Rejected>;
    type SerializeMap = Impossible<(), Rejected>;
    type SerializeStruct = Impossible<(), Rejected>;
    type SerializeStructVariant = Impossible<(), Rejected>;

    fn serialize_str(self, _: &str) -> Checked {
        Ok(())
    }
    fn serialize_char(self, _: char) -> Checked {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_bool(self, _: bool) -> Checked {
        Err(non_string_key("boolean"))
    }
    fn serialize_i8(self, _: i8) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_i16(self, _: i16) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_i32(self, _: i32) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_i64(self, _: i64) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_i128(self, _: i128) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_u8(self, _: u8) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_u16(self, _: u16) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_u32(self, _: u32) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_u64(self, _: u64) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_u128(self, _: u128) -> Checked {
        Err(non_string_key("integer"))
    }
    fn serialize_f32(self, _: f32) -> Checked {
        Err(non_string_key("float"))
    }
    fn serialize_f64(self, _: f64) -> Checked {
        Err(non_string_key("float"))
    }
    fn serialize_bytes(self, _: &[u8]) -> Checked {
        Err(non_string_key("bytes"))
    }
    fn serialize_none(self) -> Checked {
        Err(non_string_key("option"))
    }
    fn serialize_some<T: ?Sized + Serialize>(self, _: &T) -> Checked {
        Err(non_string_key("option"))
    }
    fn serialize_unit(self) -> Checked {
        Err(non_string_key("unit"))
    }
    fn serialize_unit_struct(self, name: &'static str) -> Checked {
        Err(non_string_key(name))
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Checked {
        Err(non_string_key(name))
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, Rejected> {
        Err(non_string_key("sequence"))
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, Rejected> {
        Err(non_string_key("tuple"))
    }
    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, Rejected> {
        Err(non_string_key(name))
    }
    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, Rejected> {
        Err(non_string_key(name))
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, Rejected> {
        Err(non_string_key("map"))
    }
    fn serialize_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, Rejected> {
        Err(non_string_key(name))
    }
    fn serialize_struct_variant(
        self,
        name: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, Rejected> {
        Err(non_string_key(name))
    }
}
