//! Row values and identity keys.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single field value in the server's canonical text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A value whose text form is valid UTF-8.
    Text(String),
    /// Binary content that is not valid UTF-8.
    Bytes(Vec<u8>),
}

impl Value {
    /// Builds a value from the raw bytes sent by the server.
    #[must_use]
    pub fn from_bytes(bytes: Option<Vec<u8>>) -> Self {
        bytes.map_or(Self::Null, |bytes| {
            String::from_utf8(bytes).map_or_else(|err| Self::Bytes(err.into_bytes()), Self::Text)
        })
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Text(text) => f.write_str(text),
            Self::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// The field names of a read, with a precomputed name to position map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Projection {
    /// Creates a projection over `fields`, in read order.
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        let positions = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.clone(), i))
            .collect();
        Self { fields, positions }
    }

    /// Field names in read order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Position of `field` in the read, if projected.
    #[must_use]
    pub fn position(&self, field: &str) -> Option<usize> {
        self.positions.get(field).copied()
    }

    /// Number of projected fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if nothing is projected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Identity of a row across source and target: its primary key values.
pub type IdentityKey = Vec<Value>;

/// One row read through a [`Projection`].
#[derive(Debug, Clone)]
pub struct Row {
    projection: Arc<Projection>,
    values: Vec<Value>,
    key: IdentityKey,
}

impl Row {
    /// Creates a row and derives its identity key from `key_fields`.
    ///
    /// A key field missing from the projection contributes `NULL`.
    #[must_use]
    pub fn new(projection: Arc<Projection>, values: Vec<Value>, key_fields: &[String]) -> Self {
        let mut row = Self {
            projection,
            values,
            key: Vec::new(),
        };
        row.key = key_fields.iter().map(|f| row.get(f).clone()).collect();
        row
    }

    /// Value of `field`, `NULL` when the field is not projected.
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.projection
            .position(field)
            .and_then(|i| self.values.get(i))
            .unwrap_or(&NULL)
    }

    /// The identity key.
    #[must_use]
    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// Values in projection order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The projection this row was read through.
    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.values == other.values
    }
}

impl Eq for Row {}
