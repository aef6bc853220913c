//! Loose ingestion shape for remote documents.
//!
//! A `RawRecord` makes no promises about its fields: any of them may be
//! missing, null, or of the wrong JSON type. Turning it into a `Record`
//! is the normalizer's job and never fails.

use serde_json::{Map, Value};

/// Untyped record as delivered by a document store snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Document id from the store envelope, when the store keeps ids
    /// outside the document body.
    pub id: Option<String>,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Builds a raw record from a store envelope id plus document body.
    ///
    /// The envelope id wins over any `id` field inside the body. Non-object
    /// bodies are treated as empty documents.
    pub fn from_document(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: Some(id.into()),
            fields: into_object(data),
        }
    }

    /// Builds a raw record from a self-describing JSON value, reading the
    /// id from its `id` field when present.
    pub fn from_value(value: Value) -> Self {
        let fields = into_object(value);
        let id = match fields.get("id") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        Self { id, fields }
    }

    /// Sets one body field.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Returns the first non-null value among `names`.
    pub fn field(&self, names: &[&str]) -> Option<&Value> {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .find(|value| !value.is_null())
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
