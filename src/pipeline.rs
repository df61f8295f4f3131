//! # Pipeline Graph
//!
//! A [`Pipeline`] is the DAG of processing nodes describing a stream
//! processing job: an ordered list of nodes plus parent/child [`Edge`]s.
//! [`PipelineBuilder`] assembles one, handing out node identities from an
//! owned (or shared) [`IdGenerator`].
//!
//! ## Document Format
//!
//! ```text
//! {"nodes":[{"typeOf":"window","ID":"1",...}],"edges":[{"parent":"1","child":"2"}]}
//! ```
//!
//! Nodes use the envelope described in [`crate::codec`]; edge endpoints use
//! the same decimal-string identity encoding. Decoding rejects duplicate
//! identities, edges to unknown nodes, self-loops and cycles.
//!
//! ## Example
//!
//! ```rust
//! use pipegraph::pipeline::PipelineBuilder;
//! use pipegraph::window::WindowNode;
//! use std::time::Duration;
//!
//! let mut builder = PipelineBuilder::new();
//! let hourly = builder
//!   .window(|w| {
//!     w.period(Duration::from_secs(3600)).every(Duration::from_secs(3600));
//!   })
//!   .unwrap();
//! let mut counted = WindowNode::new();
//! counted.period_count(10).every_count(5);
//! builder.chain(hourly, counted).unwrap();
//!
//! let pipeline = builder.build().unwrap();
//! assert_eq!(pipeline.len(), 2);
//! assert_eq!(pipeline.children(hourly).len(), 1);
//! ```

use crate::codec;
use crate::config::{JsonFormat, PipelineConfig};
use crate::error::{CodecError, GraphError};
use crate::node::{IdGenerator, NodeId, NodeKind, PipelineNode};
use crate::registry::NodeRegistry;
use crate::window::WindowNode;
use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

/// Directed link from a parent node to the child it feeds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  /// Upstream node.
  pub parent: NodeId,
  /// Downstream node.
  pub child: NodeId,
}

impl Edge {
  /// Creates an edge.
  pub fn new(parent: NodeId, child: NodeId) -> Self {
    Self { parent, child }
  }
}

/// A directed acyclic graph of pipeline nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pipeline {
  nodes: Vec<Box<dyn PipelineNode>>,
  edges: Vec<Edge>,
}

impl Pipeline {
  /// Creates an empty pipeline.
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the number of nodes.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// Returns true if the pipeline has no nodes.
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Iterates over the nodes in insertion order.
  pub fn nodes(&self) -> impl Iterator<Item = &dyn PipelineNode> {
    self.nodes.iter().map(|node| node.as_ref())
  }

  /// Returns all edges in insertion order.
  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  /// Returns true if a node with this identity exists.
  pub fn contains(&self, id: NodeId) -> bool {
    self.position(id).is_some()
  }

  /// Looks up a node by identity.
  pub fn node(&self, id: NodeId) -> Option<&dyn PipelineNode> {
    self.position(id).map(|i| self.nodes[i].as_ref())
  }

  /// Looks up a node by identity, mutably.
  pub fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn PipelineNode> {
    let i = self.position(id)?;
    Some(self.nodes[i].as_mut())
  }

  /// Looks up a node of kind `T` by identity.
  pub fn get<T: NodeKind>(&self, id: NodeId) -> Option<&T> {
    self.node(id).and_then(|node| node.downcast_ref::<T>())
  }

  /// Looks up a node of kind `T` by identity, mutably.
  pub fn get_mut<T: NodeKind>(&mut self, id: NodeId) -> Option<&mut T> {
    self.node_mut(id).and_then(|node| node.downcast_mut::<T>())
  }

  /// Returns the direct children of a node, in edge order.
  pub fn children(&self, id: NodeId) -> Vec<NodeId> {
    self
      .edges
      .iter()
      .filter(|e| e.parent == id)
      .map(|e| e.child)
      .collect()
  }

  /// Returns the direct parents of a node, in edge order.
  pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
    self
      .edges
      .iter()
      .filter(|e| e.child == id)
      .map(|e| e.parent)
      .collect()
  }

  /// Returns the nodes without parents, in insertion order.
  pub fn roots(&self) -> Vec<NodeId> {
    let children: HashSet<NodeId> = self.edges.iter().map(|e| e.child).collect();
    self
      .nodes
      .iter()
      .map(|node| node.id())
      .filter(|id| !children.contains(id))
      .collect()
  }

  /// Adds a node.
  ///
  /// # Errors
  ///
  /// Returns [`GraphError::DuplicateId`] if a node with the same identity
  /// already exists.
  pub fn insert(&mut self, node: Box<dyn PipelineNode>) -> Result<NodeId, GraphError> {
    let id = node.id();
    if self.contains(id) {
      return Err(GraphError::DuplicateId { id: id.as_u64() });
    }
    trace!(%id, type_of = node.type_of(), "inserted pipeline node");
    self.nodes.push(node);
    Ok(id)
  }

  /// Links `parent` to `child`. Linking an existing pair again is a no-op.
  ///
  /// # Errors
  ///
  /// Returns an error if either node is missing, if `parent == child`, or if
  /// the edge would close a cycle.
  pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
    for id in [parent, child] {
      if !self.contains(id) {
        return Err(GraphError::UnknownNode { id: id.as_u64() });
      }
    }
    if parent == child {
      return Err(GraphError::SelfLoop {
        id: parent.as_u64(),
      });
    }
    let edge = Edge::new(parent, child);
    if self.edges.contains(&edge) {
      return Ok(());
    }
    if self.reaches(child, parent) {
      return Err(GraphError::Cycle {
        parent: parent.as_u64(),
        child: child.as_u64(),
      });
    }
    debug!(%parent, %child, "linked pipeline nodes");
    self.edges.push(edge);
    Ok(())
  }

  /// Returns node identities in topological order (parents before children).
  ///
  /// Ties are broken by insertion order, so the result is deterministic.
  pub fn sorted(&self) -> Vec<NodeId> {
    let mut in_degree: HashMap<NodeId, usize> =
      self.nodes.iter().map(|node| (node.id(), 0)).collect();
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for edge in &self.edges {
      adjacency.entry(edge.parent).or_default().push(edge.child);
      if let Some(degree) = in_degree.get_mut(&edge.child) {
        *degree += 1;
      }
    }

    // Kahn's algorithm
    let mut queue: VecDeque<NodeId> = self
      .nodes
      .iter()
      .map(|node| node.id())
      .filter(|id| in_degree.get(id) == Some(&0))
      .collect();
    let mut order = Vec::with_capacity(self.nodes.len());
    while let Some(id) = queue.pop_front() {
      order.push(id);
      for child in adjacency.get(&id).into_iter().flatten() {
        if let Some(degree) = in_degree.get_mut(child) {
          *degree -= 1;
          if *degree == 0 {
            queue.push_back(*child);
          }
        }
      }
    }
    order
  }

  /// Encodes the pipeline as a JSON value.
  pub fn to_value(&self) -> Value {
    let nodes = self
      .nodes
      .iter()
      .map(|node| codec::encode_value(node.as_ref()))
      .collect();
    let edges = self
      .edges
      .iter()
      .map(|e| {
        serde_json::json!({
          "parent": e.parent.to_string(),
          "child": e.child.to_string(),
        })
      })
      .collect();
    serde_json::json!({ "nodes": Value::Array(nodes), "edges": Value::Array(edges) })
  }

  /// Encodes the pipeline as JSON text, nodes in wire order.
  pub fn to_json(&self, format: JsonFormat) -> Result<String, CodecError> {
    let json = match format {
      JsonFormat::Compact => serde_json::to_string(self)?,
      JsonFormat::Pretty => serde_json::to_string_pretty(self)?,
    };
    Ok(json)
  }

  /// Decodes a pipeline document, resolving node kinds through `registry`.
  pub fn from_value(registry: &NodeRegistry, value: &Value) -> Result<Self, GraphError> {
    let document = value
      .as_object()
      .ok_or_else(|| GraphError::InvalidDocument("expected a JSON object".to_string()))?;
    let nodes = match document.get("nodes") {
      Some(Value::Array(nodes)) => nodes.as_slice(),
      Some(_) => return Err(GraphError::InvalidDocument("\"nodes\" must be an array".to_string())),
      None => return Err(GraphError::InvalidDocument("missing \"nodes\"".to_string())),
    };
    let edges = match document.get("edges") {
      Some(Value::Array(edges)) => edges.as_slice(),
      Some(_) => return Err(GraphError::InvalidDocument("\"edges\" must be an array".to_string())),
      None => &[],
    };

    let mut pipeline = Pipeline::new();
    for node in nodes {
      pipeline.insert(registry.decode_value(node)?)?;
    }
    for (i, edge) in edges.iter().enumerate() {
      let edge = Edge::deserialize(edge)
        .map_err(|e| GraphError::InvalidDocument(format!("edge {}: {}", i, e)))?;
      pipeline.link(edge.parent, edge.child)?;
    }
    debug!(
      nodes = pipeline.len(),
      edges = pipeline.edges.len(),
      "decoded pipeline"
    );
    Ok(pipeline)
  }

  /// Decodes a pipeline document from JSON text.
  pub fn from_json_str(registry: &NodeRegistry, json: &str) -> Result<Self, GraphError> {
    let value: Value = serde_json::from_str(json).map_err(CodecError::from)?;
    Self::from_value(registry, &value)
  }

  /// Checks that no two nodes share an identity.
  ///
  /// [`insert`](Self::insert) keeps identities unique, but
  /// [`node_mut`](Self::node_mut) and [`get_mut`](Self::get_mut) allow a
  /// node to be re-identified afterwards.
  pub fn check_unique_ids(&self) -> Result<(), GraphError> {
    let mut seen = HashSet::with_capacity(self.nodes.len());
    for node in &self.nodes {
      let id = node.id();
      if !seen.insert(id) {
        return Err(GraphError::DuplicateId { id: id.as_u64() });
      }
    }
    Ok(())
  }

  fn position(&self, id: NodeId) -> Option<usize> {
    self.nodes.iter().position(|node| node.id() == id)
  }

  /// Returns true if `to` is reachable from `from` along edges.
  fn reaches(&self, from: NodeId, to: NodeId) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
      if id == to {
        return true;
      }
      if seen.insert(id) {
        stack.extend(self.edges.iter().filter(|e| e.parent == id).map(|e| e.child));
      }
    }
    false
  }
}

impl Serialize for Pipeline {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Pipeline", 2)?;
    state.serialize_field("nodes", &self.nodes)?;
    state.serialize_field("edges", &self.edges)?;
    state.end()
  }
}

impl<'de> Deserialize<'de> for Pipeline {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Pipeline::from_value(NodeRegistry::global(), &value).map_err(D::Error::custom)
  }
}

/// Assembles a [`Pipeline`], assigning node identities as nodes are added.
///
/// Identities come from an [`IdGenerator`] owned by the builder, or shared
/// between builders through [`PipelineBuilder::with_id_generator`] so that
/// pipelines built concurrently never reuse an identity.
#[derive(Debug)]
pub struct PipelineBuilder {
  config: PipelineConfig,
  ids: Arc<IdGenerator>,
  pipeline: Pipeline,
}

impl PipelineBuilder {
  /// Creates a builder with the default configuration.
  pub fn new() -> Self {
    Self::with_config(PipelineConfig::default())
  }

  /// Creates a builder with its own generator starting at `config.first_id`.
  pub fn with_config(config: PipelineConfig) -> Self {
    let ids = Arc::new(IdGenerator::new(config.first_id));
    Self::with_id_generator(config, ids)
  }

  /// Creates a builder drawing identities from a shared generator.
  ///
  /// `config.first_id` is ignored; the generator decides.
  pub fn with_id_generator(config: PipelineConfig, ids: Arc<IdGenerator>) -> Self {
    Self {
      config,
      ids,
      pipeline: Pipeline::new(),
    }
  }

  /// Returns the builder configuration.
  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Returns the pipeline built so far.
  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  /// Adds a node, assigning it a fresh identity. Any identity already set
  /// on `node` is overwritten.
  ///
  /// # Errors
  ///
  /// Returns [`GraphError::IdsExhausted`] if the generator has run out, or
  /// [`GraphError::DuplicateId`] if a node already in the builder was given
  /// the same identity through [`node_mut`](Self::node_mut).
  pub fn add<T: NodeKind>(&mut self, mut node: T) -> Result<NodeId, GraphError> {
    let id = self.ids.next().ok_or(GraphError::IdsExhausted)?;
    node.set_id(id);
    self.pipeline.insert(Box::new(node))?;
    debug!(%id, type_of = T::TYPE_OF, "added pipeline node");
    Ok(id)
  }

  /// Adds a window node configured by `configure`.
  pub fn window<F>(&mut self, configure: F) -> Result<NodeId, GraphError>
  where
    F: FnOnce(&mut WindowNode),
  {
    let mut window = WindowNode::new();
    configure(&mut window);
    self.add(window)
  }

  /// Adds `node` as a child of `parent`.
  ///
  /// # Errors
  ///
  /// Returns [`GraphError::UnknownNode`] if `parent` does not exist; the
  /// node is not added in that case.
  pub fn chain<T: NodeKind>(&mut self, parent: NodeId, node: T) -> Result<NodeId, GraphError> {
    if !self.pipeline.contains(parent) {
      return Err(GraphError::UnknownNode {
        id: parent.as_u64(),
      });
    }
    let id = self.add(node)?;
    self.pipeline.link(parent, id)?;
    Ok(id)
  }

  /// Links two nodes already in the builder.
  pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
    self.pipeline.link(parent, child)
  }

  /// Looks up a node of kind `T` for further configuration.
  pub fn node_mut<T: NodeKind>(&mut self, id: NodeId) -> Option<&mut T> {
    self.pipeline.get_mut::<T>(id)
  }

  /// Finishes the pipeline.
  ///
  /// # Errors
  ///
  /// Returns [`GraphError::DuplicateId`] if two nodes ended up with the same
  /// identity, and with `validate_windows` set, [`GraphError::InvalidWindow`]
  /// for the first window node whose configuration is inconsistent.
  pub fn build(self) -> Result<Pipeline, GraphError> {
    self.pipeline.check_unique_ids()?;
    if self.config.validate_windows {
      for node in self.pipeline.nodes() {
        if let Some(window) = node.downcast_ref::<WindowNode>() {
          window.validate().map_err(|source| GraphError::InvalidWindow {
            id: node.id().as_u64(),
            source,
          })?;
        }
      }
    }
    Ok(self.pipeline)
  }

  /// Finishes the pipeline and encodes it using the configured format.
  pub fn build_json(self) -> Result<String, GraphError> {
    let format = self.config.format;
    let pipeline = self.build()?;
    Ok(pipeline.to_json(format)?)
  }
}

impl Default for PipelineBuilder {
  fn default() -> Self {
    Self::new()
  }
}
