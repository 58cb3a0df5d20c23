//! Field metadata for the lossless codec.
//!
//! A [`Schema`] is a statically declared mapping from JSON field names to
//! [`FieldDirective`]s. The codec consults it while decoding and encoding to
//! decide how each numeric (or nested) field is represented.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Shared handle to a schema. Identity (pointer equality) is meaningful:
/// schema factories key their caches on it.
pub type SchemaRef = Arc<Schema>;

/// Declared representation of a single field.
#[derive(Debug, Clone)]
pub enum FieldDirective {
    /// A native number; decoding fails if the value is not exactly representable
    PlainNumber,
    /// A 64-bit integer held as its exact decimal string
    Int64AsString,
    /// An array of 64-bit integers, each held as a decimal string
    Int64AsStringArray,
    /// An arbitrary-size integer
    BigIntValue,
    /// An array of arbitrary-size integers
    BigIntValueArray,
    /// An object (or array of objects) decoded with a child schema
    Nested(SchemaRef),
}

impl FieldDirective {
    /// Short name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlainNumber => "PlainNumber",
            Self::Int64AsString => "Int64AsString",
            Self::Int64AsStringArray => "Int64AsStringArray",
            Self::BigIntValue => "BigIntValue",
            Self::BigIntValueArray => "BigIntValueArray",
            Self::Nested(_) => "Nested",
        }
    }
}

/// A named set of field directives describing one data class.
#[derive(Clone)]
pub struct Schema {
    name: String,
    fields: BTreeMap<String, FieldDirective>,
}

impl Schema {
    /// Start declaring a schema
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// The schema with no directives.
    ///
    /// Every call returns the same handle, so it is safe to use as a
    /// factory cache key.
    pub fn opaque() -> SchemaRef {
        static OPAQUE: OnceLock<SchemaRef> = OnceLock::new();
        OPAQUE
            .get_or_init(|| Schema::builder("Opaque").build())
            .clone()
    }

    /// Start a new schema from this one's fields.
    pub fn extend(&self, name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: self.fields.clone(),
        }
    }

    /// Schema name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directive declared for a field, if any
    pub fn directive(&self, field: &str) -> Option<&FieldDirective> {
        self.fields.get(field)
    }

    /// Iterate over declared fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDirective)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether no directives are declared
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: BTreeMap<&str, String> = self
            .fields
            .iter()
            .map(|(k, v)| {
                let desc = match v {
                    FieldDirective::Nested(child) => format!("Nested({})", child.name),
                    other => other.name().to_string(),
                };
                (k.as_str(), desc)
            })
            .collect();
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &fields)
            .finish()
    }
}

/// Builder for [`Schema`]. Declaring a field twice keeps the last directive.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: BTreeMap<String, FieldDirective>,
}

impl SchemaBuilder {
    /// Declare a field with an explicit directive
    pub fn field(mut self, name: impl Into<String>, directive: FieldDirective) -> Self {
        self.fields.insert(name.into(), directive);
        self
    }

    /// Declare a native-number field
    pub fn plain(self, name: impl Into<String>) -> Self {
        self.field(name, FieldDirective::PlainNumber)
    }

    /// Declare a 64-bit integer field held as a string
    pub fn int64(self, name: impl Into<String>) -> Self {
        self.field(name, FieldDirective::Int64AsString)
    }

    /// Declare an array of 64-bit integers held as strings
    pub fn int64_array(self, name: impl Into<String>) -> Self {
        self.field(name, FieldDirective::Int64AsStringArray)
    }

    /// Declare a big-integer field
    pub fn bigint(self, name: impl Into<String>) -> Self {
        self.field(name, FieldDirective::BigIntValue)
    }

    /// Declare an array of big integers
    pub fn bigint_array(self, name: impl Into<String>) -> Self {
        self.field(name, FieldDirective::BigIntValueArray)
    }

    /// Declare a nested object (or array of objects) field
    pub fn nested(self, name: impl Into<String>, child: SchemaRef) -> Self {
        self.field(name, FieldDirective::Nested(child))
    }

    /// Finish the schema
    pub fn build(self) -> SchemaRef {
        Arc::new(Schema {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// A type with a statically declared schema.
///
/// Implementations should return the same handle on every call, typically
/// from a `static OnceLock`:
///
/// ```ignore
/// impl LosslessDto for Order {
///     fn schema() -> SchemaRef {
///         static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
///         SCHEMA
///             .get_or_init(|| Schema::builder("Order").int64("orderKey").build())
///             .clone()
///     }
/// }
/// ```
pub trait LosslessDto {
    /// The schema describing this type's fields
    fn schema() -> SchemaRef;
}

impl LosslessDto for serde_json::Value {
    fn schema() -> SchemaRef {
        Schema::opaque()
    }
}

impl LosslessDto for serde_json::Map<String, serde_json::Value> {
    fn schema() -> SchemaRef {
        Schema::opaque()
    }
}

impl<V> LosslessDto for HashMap<String, V> {
    fn schema() -> SchemaRef {
        Schema::opaque()
    }
}

impl<V> LosslessDto for BTreeMap<String, V> {
    fn schema() -> SchemaRef {
        Schema::opaque()
    }
}

impl LosslessDto for () {
    fn schema() -> SchemaRef {
        Schema::opaque()
    }
}
