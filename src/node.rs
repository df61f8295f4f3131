//! # Pipeline Nodes - Identity and the Common Node Interface
//!
//! Every node in a pipeline graph carries a graph-unique [`NodeId`] and
//! embeds a [`ChainNode`], the structural base that lets graph code treat
//! all node kinds uniformly. Concrete kinds implement [`PipelineNode`] (the
//! object-safe interface the codec and the graph work against) and
//! [`NodeKind`] (the static tag and constructor the registry needs).
//!
//! ## Identity
//!
//! - A fresh node has [`NodeId::UNSET`] (zero).
//! - A graph builder assigns identities from an [`IdGenerator`]; nothing at
//!   this layer checks uniqueness.
//! - On the wire an identity is a decimal string (`"ID":"5"`), never a
//!   JSON number.
//!
//! ## Example
//!
//! ```rust
//! use pipegraph::node::{IdGenerator, NodeId, PipelineNode};
//! use pipegraph::window::WindowNode;
//!
//! let ids = IdGenerator::new(1);
//! let mut window = WindowNode::new();
//! assert_eq!(window.id(), NodeId::UNSET);
//!
//! window.set_id(ids.next().unwrap());
//! assert_eq!(window.id(), NodeId::new(1));
//! ```

use crate::codec::{FieldDecoder, FieldEncoder};
use crate::error::CodecError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Graph-unique identity of a pipeline node.
///
/// Zero means "not yet assigned". Serializes as a base-10 string.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
  /// The identity of a node that has not been assigned one yet.
  pub const UNSET: NodeId = NodeId(0);

  /// Creates an identity from a raw value.
  #[inline]
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  /// Returns the raw u64 value.
  #[inline]
  pub const fn as_u64(self) -> u64 {
    self.0
  }

  /// Returns true if this is [`NodeId::UNSET`].
  #[inline]
  pub const fn is_unset(self) -> bool {
    self.0 == 0
  }
}

impl From<u64> for NodeId {
  fn from(id: u64) -> Self {
    Self(id)
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for NodeId {
  type Err = CodecError;

  /// Parses a plain base-10 string. Signs, whitespace and empty strings are
  /// rejected.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || CodecError::InvalidId {
      value: format!("{:?}", s),
    };
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    s.parse::<u64>().map(NodeId).map_err(|_| invalid())
  }
}

impl Serialize for NodeId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for NodeId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct NodeIdVisitor;

    impl Visitor<'_> for NodeIdVisitor {
      type Value = NodeId;

      fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal node id string")
      }

      fn visit_str<E: de::Error>(self, v: &str) -> Result<NodeId, E> {
        v.parse().map_err(E::custom)
      }
    }

    deserializer.deserialize_str(NodeIdVisitor)
  }
}

/// Hands out monotonically increasing node identities.
///
/// Owned by a graph builder (or shared between builders behind an `Arc`);
/// `next` only needs `&self`, so concurrent builders never hand out the
/// same identity twice. Zero is never handed out: it marks an unset
/// identity, and it is also what the counter holds once `u64::MAX` has been
/// issued.
#[derive(Debug)]
pub struct IdGenerator {
  next: AtomicU64,
}

impl IdGenerator {
  /// Creates a generator whose first identity is `first`, or 1 if `first`
  /// is zero.
  pub fn new(first: u64) -> Self {
    Self {
      next: AtomicU64::new(first.max(1)),
    }
  }

  /// Returns the next identity and advances the counter, or `None` once
  /// every identity up to `u64::MAX` has been issued.
  pub fn next(&self) -> Option<NodeId> {
    self
      .next
      .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
        (n != 0).then(|| n.wrapping_add(1))
      })
      .ok()
      .map(NodeId)
  }

  /// Returns the identity the next call to [`next`](Self::next) will yield.
  pub fn peek(&self) -> Option<NodeId> {
    match self.next.load(Ordering::Relaxed) {
      0 => None,
      n => Some(NodeId(n)),
    }
  }
}

impl Default for IdGenerator {
  fn default() -> Self {
    Self::new(1)
  }
}

/// Identity holder embedded (through [`ChainNode`]) in every node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeBase {
  id: NodeId,
}

impl NodeBase {
  /// Creates a base with an unset identity.
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the node identity.
  pub fn id(&self) -> NodeId {
    self.id
  }

  /// Assigns the node identity.
  pub fn set_id(&mut self, id: NodeId) {
    self.id = id;
  }
}

/// A link in a processing chain.
///
/// Adds no persisted state of its own; it is the base every concrete node
/// embeds so graph traversal can reach the identity of any node kind.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChainNode {
  node: NodeBase,
}

impl ChainNode {
  /// Creates a chain node with an unset identity.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a chain node with the given identity.
  pub fn with_id(id: NodeId) -> Self {
    Self {
      node: NodeBase { id },
    }
  }

  /// Returns the embedded identity holder.
  pub fn base(&self) -> &NodeBase {
    &self.node
  }

  /// Returns the node identity.
  pub fn id(&self) -> NodeId {
    self.node.id()
  }

  /// Assigns the node identity.
  pub fn set_id(&mut self, id: NodeId) {
    self.node.set_id(id);
  }
}

/// The object-safe interface shared by every pipeline node kind.
///
/// The codec writes the envelope (`typeOf`, `ID`) itself and delegates the
/// rest to [`encode_fields`](Self::encode_fields) and
/// [`decode_fields`](Self::decode_fields), so each kind owns the schema of
/// its own attributes.
pub trait PipelineNode: Any + fmt::Debug + Send + Sync + 'static {
  /// Returns the `typeOf` tag of this node kind.
  fn type_of(&self) -> &'static str;

  /// Returns the embedded chain base.
  fn chain(&self) -> &ChainNode;

  /// Returns the embedded chain base mutably.
  fn chain_mut(&mut self) -> &mut ChainNode;

  /// Returns the node identity.
  fn id(&self) -> NodeId {
    self.chain().id()
  }

  /// Assigns the node identity.
  fn set_id(&mut self, id: NodeId) {
    self.chain_mut().set_id(id);
  }

  /// Writes the kind-specific fields, in wire order.
  fn encode_fields(&self, fields: &mut FieldEncoder);

  /// Reads the kind-specific fields into `self`.
  ///
  /// Called on a freshly constructed node; on error the codec discards it.
  fn decode_fields(&mut self, fields: &FieldDecoder<'_>) -> Result<(), CodecError>;

  /// Returns `self` as `Any` for downcasting.
  fn as_any(&self) -> &dyn Any;

  /// Returns `self` as mutable `Any` for downcasting.
  fn as_any_mut(&mut self) -> &mut dyn Any;

  /// Clones the node behind a fresh box.
  fn clone_node(&self) -> Box<dyn PipelineNode>;

  /// Compares against a node of any kind. Nodes of different kinds are
  /// never equal.
  fn node_eq(&self, other: &dyn PipelineNode) -> bool;
}

/// Static side of a node kind: its tag and zero-valued constructor.
///
/// Implemented by every concrete kind so the registry can build one from a
/// tag and the decoder can check a payload against the expected kind.
pub trait NodeKind: PipelineNode + Default + Clone {
  /// The `typeOf` tag written on the wire.
  const TYPE_OF: &'static str;
}

impl dyn PipelineNode {
  /// Returns true if the node is of kind `T`.
  pub fn is<T: NodeKind>(&self) -> bool {
    self.as_any().is::<T>()
  }

  /// Downcasts to a concrete node kind.
  pub fn downcast_ref<T: NodeKind>(&self) -> Option<&T> {
    self.as_any().downcast_ref::<T>()
  }

  /// Downcasts to a concrete node kind, mutably.
  pub fn downcast_mut<T: NodeKind>(&mut self) -> Option<&mut T> {
    self.as_any_mut().downcast_mut::<T>()
  }
}

impl Clone for Box<dyn PipelineNode> {
  fn clone(&self) -> Self {
    self.clone_node()
  }
}

impl PartialEq for dyn PipelineNode {
  fn eq(&self, other: &Self) -> bool {
    self.node_eq(other)
  }
}
