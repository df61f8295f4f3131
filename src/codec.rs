//! # Node Envelope Codec
//!
//! Every node travels as one flat JSON object:
//!
//! ```text
//! {"typeOf":"window","ID":"0","period":3600000000000,"every":60000000000,...}
//! ```
//!
//! `typeOf` and `ID` always come first, followed by the node's own fields in
//! the order the node writes them. The envelope is written here; the
//! kind-specific part goes through [`FieldEncoder`] and [`FieldDecoder`] so
//! that every node kind parses its own attributes with typed accessors that
//! report the offending field by name.
//!
//! Encoding goes straight through `serde::Serializer` rather than through a
//! `serde_json::Map`, which would reorder keys.

use crate::error::CodecError;
use crate::node::{NodeId, PipelineNode};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::time::Duration;

/// Wire name of the type discriminator.
pub const TYPE_OF_FIELD: &str = "typeOf";

/// Wire name of the node identity.
pub const ID_FIELD: &str = "ID";

/// Ordered collection of kind-specific fields, filled by
/// [`PipelineNode::encode_fields`].
#[derive(Debug, Default)]
pub struct FieldEncoder {
  fields: Vec<(&'static str, Value)>,
}

impl FieldEncoder {
  /// Creates an empty encoder.
  pub fn new() -> Self {
    Self::default()
  }

  /// Writes a duration as integer nanoseconds.
  ///
  /// Durations wider than `u64` nanoseconds (about 584 years) saturate.
  pub fn duration(&mut self, name: &'static str, value: Duration) -> &mut Self {
    let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
    self.value(name, Value::from(nanos))
  }

  /// Writes a boolean literal.
  pub fn bool(&mut self, name: &'static str, value: bool) -> &mut Self {
    self.value(name, Value::Bool(value))
  }

  /// Writes an event count.
  pub fn count(&mut self, name: &'static str, value: u64) -> &mut Self {
    self.value(name, Value::from(value))
  }

  /// Writes a string.
  pub fn string(&mut self, name: &'static str, value: &str) -> &mut Self {
    self.value(name, Value::String(value.to_string()))
  }

  /// Writes an arbitrary JSON value.
  pub fn value(&mut self, name: &'static str, value: Value) -> &mut Self {
    self.fields.push((name, value));
    self
  }

  /// Returns the fields written so far, in order.
  pub fn fields(&self) -> &[(&'static str, Value)] {
    &self.fields
  }

  /// Returns the number of fields written.
  pub fn len(&self) -> usize {
    self.fields.len()
  }

  /// Returns true if no field has been written.
  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }
}

/// Typed, read-only view over the fields of a decoded envelope.
///
/// Every accessor fails with [`CodecError::MissingField`] when the field is
/// absent and [`CodecError::InvalidField`] when it has the wrong shape.
/// Fields the node never asks for are ignored.
#[derive(Debug, Clone, Copy)]
pub struct FieldDecoder<'a> {
  fields: &'a Map<String, Value>,
}

impl<'a> FieldDecoder<'a> {
  /// Wraps the fields of a JSON object.
  pub fn new(fields: &'a Map<String, Value>) -> Self {
    Self { fields }
  }

  /// Reads a duration encoded as non-negative integer nanoseconds.
  pub fn duration(&self, name: &'static str) -> Result<Duration, CodecError> {
    self.unsigned(name).map(Duration::from_nanos)
  }

  /// Reads a non-negative event count.
  pub fn count(&self, name: &'static str) -> Result<u64, CodecError> {
    self.unsigned(name)
  }

  /// Reads a boolean literal.
  pub fn bool(&self, name: &'static str) -> Result<bool, CodecError> {
    match self.require(name)? {
      Value::Bool(b) => Ok(*b),
      other => Err(invalid(name, format!("expected a boolean, found {}", json_kind(other)))),
    }
  }

  /// Reads a string.
  pub fn string(&self, name: &'static str) -> Result<&'a str, CodecError> {
    match self.require(name)? {
      Value::String(s) => Ok(s.as_str()),
      other => Err(invalid(name, format!("expected a string, found {}", json_kind(other)))),
    }
  }

  /// Returns the raw value of a field, if present.
  pub fn get(&self, name: &str) -> Option<&'a Value> {
    self.fields.get(name)
  }

  fn require(&self, name: &'static str) -> Result<&'a Value, CodecError> {
    self
      .fields
      .get(name)
      .ok_or(CodecError::MissingField { field: name })
  }

  fn unsigned(&self, name: &'static str) -> Result<u64, CodecError> {
    match self.require(name)? {
      Value::Number(n) => n.as_u64().ok_or_else(|| {
        if n.is_i64() {
          invalid(name, format!("must not be negative, found {}", n))
        } else {
          invalid(name, format!("expected an unsigned integer, found {}", n))
        }
      }),
      other => Err(invalid(
        name,
        format!("expected an integer, found {}", json_kind(other)),
      )),
    }
  }
}

fn invalid(field: &'static str, reason: String) -> CodecError {
  CodecError::InvalidField { field, reason }
}

/// Names the kind of a JSON value for error messages.
pub fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Returns the fields of an envelope, or fails if the payload is not an object.
pub(crate) fn as_envelope(value: &Value) -> Result<&Map<String, Value>, CodecError> {
  value.as_object().ok_or(CodecError::NotAnObject {
    found: json_kind(value),
  })
}

/// Reads the `typeOf` discriminator.
pub(crate) fn read_type_of(fields: &Map<String, Value>) -> Result<&str, CodecError> {
  fields
    .get(TYPE_OF_FIELD)
    .and_then(Value::as_str)
    .ok_or(CodecError::MissingType)
}

/// Reads and parses the `ID` field.
pub(crate) fn read_id(fields: &Map<String, Value>) -> Result<NodeId, CodecError> {
  match fields.get(ID_FIELD) {
    None => Err(CodecError::MissingId),
    Some(Value::String(s)) => s.parse(),
    Some(other) => Err(CodecError::InvalidId {
      value: other.to_string(),
    }),
  }
}

/// Encodes a node as a JSON value.
///
/// Key order is not preserved by `serde_json::Value`; use
/// [`encode_to_string`] when the textual layout matters.
pub fn encode_value(node: &dyn PipelineNode) -> Value {
  let mut fields = FieldEncoder::new();
  node.encode_fields(&mut fields);

  let mut map = Map::new();
  map.insert(TYPE_OF_FIELD.to_string(), Value::from(node.type_of()));
  map.insert(ID_FIELD.to_string(), Value::from(node.id().to_string()));
  for (name, value) in fields.fields {
    map.insert(name.to_string(), value);
  }
  Value::Object(map)
}

/// Encodes a node as compact JSON text in wire order.
pub fn encode_to_string(node: &dyn PipelineNode) -> Result<String, CodecError> {
  Ok(serde_json::to_string(node)?)
}

/// Encodes a node as compact JSON bytes in wire order.
pub fn encode_to_vec(node: &dyn PipelineNode) -> Result<Vec<u8>, CodecError> {
  Ok(serde_json::to_vec(node)?)
}

impl Serialize for dyn PipelineNode {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut fields = FieldEncoder::new();
    self.encode_fields(&mut fields);

    let mut map = serializer.serialize_map(Some(fields.len() + 2))?;
    map.serialize_entry(TYPE_OF_FIELD, self.type_of())?;
    map.serialize_entry(ID_FIELD, &self.id())?;
    for (name, value) in fields.fields() {
      map.serialize_entry(name, value)?;
    }
    map.end()
  }
}
