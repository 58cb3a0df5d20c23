//! Lossless JSON codec.
//!
//! The engine's REST API carries 64-bit keys as bare JSON integers, which do
//! not fit a double. Every numeric literal is read exactly and then mapped by
//! the field's [`FieldDirective`]:
//!
//! - [`Int64AsString`](FieldDirective::Int64AsString) becomes the exact decimal string
//! - [`BigIntValue`](FieldDirective::BigIntValue) becomes a canonical decimal string,
//!   read into a `BigInt` with `serde_with::DisplayFromStr`
//! - [`Nested`](FieldDirective::Nested) recurses with a child schema
//! - anything else stays a number only if it round-trips through `f64`,
//!   otherwise decoding fails with [`CoreError::UnsafeNumber`](crate::CoreError::UnsafeNumber)
//!
//! Encoding reverses the mapping so the wire always sees bare integers.

mod factory;
mod number;
mod parse;
mod schema;
mod serialize;

pub use factory::{
    job_envelope, job_schema, process_instance_result_envelope, process_instance_result_schema,
    SchemaFactory,
};
pub use number::LosslessNumber;
pub use parse::{parse, parse_array, parse_as, parse_with};
pub use schema::{FieldDirective, LosslessDto, Schema, SchemaBuilder, SchemaRef};
pub use serialize::{serialize, serialize_with, to_wire_value};
