//! # Node Type Registry
//!
//! Maps `typeOf` tags to node constructors and drives polymorphic decoding.
//!
//! Decoding an envelope:
//!
//! 1. read `typeOf` and look up the factory registered for it
//! 2. read and parse `ID`
//! 3. build a zero-valued node, assign the identity, and let the node parse
//!    its own fields through a [`FieldDecoder`]
//!
//! A failed decode never hands out a partially populated node.
//! [`NodeRegistry::decode_into`] parses into a fresh instance and only
//! replaces the target on success, so a failure leaves the target untouched.
//!
//! ## Example
//!
//! ```rust
//! use pipegraph::registry::NodeRegistry;
//! use pipegraph::window::WindowNode;
//!
//! let registry = NodeRegistry::builtin();
//! let node = registry
//!   .decode_str(r#"{"typeOf":"window","ID":"5","period":1000,"every":1000,
//!     "align":false,"fillPeriod":false,"periodCount":0,"everyCount":0}"#)
//!   .unwrap();
//! assert_eq!(node.id().as_u64(), 5);
//! assert!(node.is::<WindowNode>());
//! ```

use crate::codec::{self, FieldDecoder};
use crate::error::{CodecError, RegistryError};
use crate::node::{NodeKind, PipelineNode};
use crate::window::WindowNode;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Constructor for a zero-valued node of one kind.
pub type NodeFactory = fn() -> Box<dyn PipelineNode>;

static BUILTIN: LazyLock<NodeRegistry> = LazyLock::new(NodeRegistry::builtin);

fn construct<T: NodeKind>() -> Box<dyn PipelineNode> {
  Box::new(T::default())
}

/// Registry of node kinds, keyed by `typeOf` tag.
#[derive(Clone, Default)]
pub struct NodeRegistry {
  factories: HashMap<&'static str, NodeFactory>,
}

impl NodeRegistry {
  /// Creates an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a registry holding every built-in node kind.
  pub fn builtin() -> Self {
    let mut registry = Self::new();
    registry
      .factories
      .insert(WindowNode::TYPE_OF, construct::<WindowNode>);
    registry
  }

  /// Returns the shared, read-only registry of built-in node kinds.
  ///
  /// Backs the serde `Deserialize` implementations.
  pub fn global() -> &'static NodeRegistry {
    &BUILTIN
  }

  /// Registers node kind `T` under its tag.
  pub fn register<T: NodeKind>(&mut self) -> Result<(), RegistryError> {
    self.register_factory(T::TYPE_OF, construct::<T>)
  }

  /// Registers a factory under `type_of`.
  pub fn register_factory(
    &mut self,
    type_of: &'static str,
    factory: NodeFactory,
  ) -> Result<(), RegistryError> {
    if self.factories.contains_key(type_of) {
      return Err(RegistryError::DuplicateType { type_of });
    }
    trace!(type_of, "registered node type");
    self.factories.insert(type_of, factory);
    Ok(())
  }

  /// Returns true if a kind is registered under `type_of`.
  pub fn contains(&self, type_of: &str) -> bool {
    self.factories.contains_key(type_of)
  }

  /// Returns the registered tags, sorted.
  pub fn type_names(&self) -> Vec<&'static str> {
    let mut names: Vec<_> = self.factories.keys().copied().collect();
    names.sort_unstable();
    names
  }

  /// Builds a zero-valued node of the kind registered under `type_of`.
  pub fn create(&self, type_of: &str) -> Result<Box<dyn PipelineNode>, CodecError> {
    self
      .factories
      .get(type_of)
      .map(|factory| factory())
      .ok_or_else(|| CodecError::UnknownType {
        type_of: type_of.to_string(),
      })
  }

  /// Encodes a node as a JSON value.
  pub fn encode(&self, node: &dyn PipelineNode) -> Value {
    codec::encode_value(node)
  }

  /// Encodes a node as compact JSON text in wire order.
  pub fn encode_to_string(&self, node: &dyn PipelineNode) -> Result<String, CodecError> {
    codec::encode_to_string(node)
  }

  /// Decodes any registered node kind from a JSON value.
  pub fn decode_value(&self, value: &Value) -> Result<Box<dyn PipelineNode>, CodecError> {
    let result = self.decode_envelope(value);
    if let Err(err) = &result {
      debug!(error = %err, "failed to decode pipeline node");
    }
    result
  }

  /// Decodes any registered node kind from JSON text.
  pub fn decode_str(&self, json: &str) -> Result<Box<dyn PipelineNode>, CodecError> {
    let value: Value = serde_json::from_str(json)?;
    self.decode_value(&value)
  }

  /// Decodes any registered node kind from JSON bytes.
  pub fn decode_slice(&self, json: &[u8]) -> Result<Box<dyn PipelineNode>, CodecError> {
    let value: Value = serde_json::from_slice(json)?;
    self.decode_value(&value)
  }

  /// Decodes a payload into an existing node of kind `T`.
  ///
  /// The payload's tag must be `T::TYPE_OF`: a registered but different tag
  /// is a [`CodecError::TypeMismatch`], an unregistered one a
  /// [`CodecError::UnknownType`]. On any error `target` is left unchanged.
  pub fn decode_into<T: NodeKind>(&self, value: &Value, target: &mut T) -> Result<(), CodecError> {
    match self.decode_kind::<T>(value) {
      Ok(node) => {
        *target = node;
        Ok(())
      }
      Err(err) => {
        debug!(error = %err, expected = T::TYPE_OF, "failed to decode pipeline node");
        Err(err)
      }
    }
  }

  fn decode_kind<T: NodeKind>(&self, value: &Value) -> Result<T, CodecError> {
    let fields = codec::as_envelope(value)?;
    let type_of = codec::read_type_of(fields)?;
    if type_of != T::TYPE_OF {
      return Err(if self.contains(type_of) {
        CodecError::TypeMismatch {
          expected: T::TYPE_OF,
          found: type_of.to_string(),
        }
      } else {
        CodecError::UnknownType {
          type_of: type_of.to_string(),
        }
      });
    }
    let id = codec::read_id(fields)?;

    let mut node = T::default();
    node.set_id(id);
    node.decode_fields(&FieldDecoder::new(fields))?;
    trace!(type_of, %id, "decoded pipeline node");
    Ok(node)
  }

  fn decode_envelope(&self, value: &Value) -> Result<Box<dyn PipelineNode>, CodecError> {
    let fields = codec::as_envelope(value)?;
    let type_of = codec::read_type_of(fields)?;
    let mut node = self.create(type_of)?;
    let id = codec::read_id(fields)?;

    node.set_id(id);
    node.decode_fields(&FieldDecoder::new(fields))?;
    trace!(type_of, %id, "decoded pipeline node");
    Ok(node)
  }
}

impl fmt::Debug for NodeRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NodeRegistry")
      .field("types", &self.type_names())
      .finish()
  }
}

impl<'de> Deserialize<'de> for Box<dyn PipelineNode> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    NodeRegistry::global()
      .decode_value(&value)
      .map_err(D::Error::custom)
  }
}
