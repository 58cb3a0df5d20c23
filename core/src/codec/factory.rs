//! Memoized composition of envelope schemas with caller-declared shapes.
//!
//! A job or a process-instance result is a fixed envelope whose `variables`
//! (and, for jobs, `customHeaders`) fields carry caller-defined shapes. The
//! factory composes the envelope with those shapes once per unique triple of
//! schema identities and hands back the same [`SchemaRef`] on every later
//! call.

use super::schema::{Schema, SchemaRef};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Identity of a `(envelope, variables, headers)` triple.
type ShapeKey = (usize, usize, Option<usize>);

struct Composed {
    /// Keeps the constituent schemas alive so their addresses stay unique
    _parts: Vec<SchemaRef>,
    schema: SchemaRef,
}

/// Memoized schema composer. The cache is unbounded and lives as long as
/// the factory.
#[derive(Default)]
pub struct SchemaFactory {
    cache: Mutex<HashMap<ShapeKey, Composed>>,
}

impl SchemaFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose `envelope` with `variables` (and optionally `headers`).
    ///
    /// The same three handles (by identity, not content, and in the same
    /// positions) always yield the same handle.
    pub fn get_or_create(
        &self,
        envelope: &SchemaRef,
        variables: &SchemaRef,
        headers: Option<&SchemaRef>,
    ) -> SchemaRef {
        let key = (
            identity(envelope),
            identity(variables),
            headers.map(identity),
        );

        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&key) {
            return existing.schema.clone();
        }

        let name = match headers {
            Some(h) => format!(
                "{}<{}, {}>",
                envelope.name(),
                variables.name(),
                h.name()
            ),
            None => format!("{}<{}>", envelope.name(), variables.name()),
        };
        let mut builder = envelope.extend(name).nested("variables", variables.clone());
        let mut parts = vec![envelope.clone(), variables.clone()];
        if let Some(h) = headers {
            builder = builder.nested("customHeaders", h.clone());
            parts.push(h.clone());
        }
        let schema = builder.build();

        tracing::trace!(schema = %schema.name(), "Composed specialized schema");
        cache.insert(
            key,
            Composed {
                _parts: parts,
                schema: schema.clone(),
            },
        );
        schema
    }

    /// Number of composed schemas held
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn identity(schema: &SchemaRef) -> usize {
    Arc::as_ptr(schema) as usize
}

/// Envelope of an activated job.
pub fn job_envelope() -> SchemaRef {
    static ENVELOPE: OnceLock<SchemaRef> = OnceLock::new();
    ENVELOPE
        .get_or_init(|| {
            Schema::builder("ActivatedJob")
                .int64("key")
                .int64("jobKey")
                .int64("processInstanceKey")
                .int64("processDefinitionKey")
                .int64("elementInstanceKey")
                .plain("processDefinitionVersion")
                .plain("retries")
                .plain("deadline")
                .build()
        })
        .clone()
}

/// Envelope of a process instance created with `awaitCompletion`.
pub fn process_instance_result_envelope() -> SchemaRef {
    static ENVELOPE: OnceLock<SchemaRef> = OnceLock::new();
    ENVELOPE
        .get_or_init(|| {
            Schema::builder("ProcessInstanceResult")
                .int64("processInstanceKey")
                .int64("processDefinitionKey")
                .plain("processDefinitionVersion")
                .build()
        })
        .clone()
}

fn job_factory() -> &'static SchemaFactory {
    static FACTORY: OnceLock<SchemaFactory> = OnceLock::new();
    FACTORY.get_or_init(SchemaFactory::new)
}

fn process_instance_factory() -> &'static SchemaFactory {
    static FACTORY: OnceLock<SchemaFactory> = OnceLock::new();
    FACTORY.get_or_init(SchemaFactory::new)
}

/// Process-wide specialized job schema for the given variable and header shapes.
pub fn job_schema(variables: &SchemaRef, headers: &SchemaRef) -> SchemaRef {
    job_factory().get_or_create(&job_envelope(), variables, Some(headers))
}

/// Process-wide specialized process-instance result schema.
pub fn process_instance_result_schema(variables: &SchemaRef) -> SchemaRef {
    process_instance_factory().get_or_create(&process_instance_result_envelope(), variables, None)
}
