//! # pipegraph
//!
//! Typed pipeline graph descriptions that round-trip through JSON.
//!
//! A pipeline is a directed acyclic graph of processing nodes. Each node is
//! persisted as one flat, tagged JSON object (its "envelope") carrying the
//! node kind (`typeOf`), its graph identity (`ID`, a decimal string) and its
//! own configuration fields:
//!
//! ```text
//! {"typeOf":"window","ID":"0","period":3600000000000,"every":60000000000,
//!  "align":true,"fillPeriod":true,"periodCount":1,"everyCount":2}
//! ```
//!
//! ## Key Features
//!
//! - **Polymorphic codec**: a registry maps `typeOf` tags to node kinds and
//!   dispatches decoding to the matching kind
//! - **Exact round-trips**: durations travel as integer nanoseconds, every
//!   field is always present on the wire
//! - **Atomic decoding**: a failed decode never leaves a half-populated node
//! - **Explicit identity**: a builder owns the ID counter; no global state
//!
//! ## Quick Start
//!
//! ```rust
//! use pipegraph::window::WindowNode;
//! use std::time::Duration;
//!
//! let mut window = WindowNode::new();
//! window.period(Duration::from_secs(3600)).every(Duration::from_secs(60));
//!
//! let json = serde_json::to_string(&window).unwrap();
//! let decoded: WindowNode = serde_json::from_str(&json).unwrap();
//! assert_eq!(decoded, window);
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Envelope layout and typed field accessors.
pub mod codec;
/// Builder and serialization settings.
pub mod config;
/// Error types for codec, registry, window and graph operations.
pub mod error;
/// Node identity, chain base and the common node interface.
pub mod node;
/// Pipeline graph container and builder.
pub mod pipeline;
/// Registry of node kinds and polymorphic decoding.
pub mod registry;
/// The window node.
pub mod window;

pub use error::{CodecError, GraphError, RegistryError, WindowConfigError};
pub use node::{ChainNode, IdGenerator, NodeBase, NodeId, NodeKind, PipelineNode};
pub use pipeline::{Edge, Pipeline, PipelineBuilder};
pub use registry::NodeRegistry;
pub use window::{WindowMode, WindowNode};

#[cfg(test)]
mod pipeline_test;
