//! Window node: batching a time-ordered stream into windows.
//!
//! A [`WindowNode`] describes how an execution engine should cut a stream
//! into windows. It works in one of two modes:
//!
//! - **Time based**: `period` is the span of each window and `every` how
//!   often a new window is emitted. `align` snaps window boundaries to the
//!   epoch instead of the first observed point, and `fill_period` holds the
//!   first window back until a full period of data has accumulated.
//! - **Count based**: `period_count` is the number of events per window and
//!   `every_count` how many events pass between emissions.
//!
//! The node is a plain configuration value. Its codec is permissive: any
//! combination of fields round-trips, including both modes or neither.
//! [`WindowNode::validate`] is available for consumers that want to reject
//! such configurations.
//!
//! # Example
//!
//! ```rust
//! use pipegraph::window::{WindowMode, WindowNode};
//! use std::time::Duration;
//!
//! let mut window = WindowNode::new();
//! window
//!   .period(Duration::from_secs(3600))
//!   .every(Duration::from_secs(60))
//!   .align();
//!
//! assert_eq!(window.mode(), WindowMode::Time);
//! assert!(window.is_sliding());
//! ```

use crate::codec::{FieldDecoder, FieldEncoder};
use crate::error::{CodecError, WindowConfigError};
use crate::node::{ChainNode, NodeKind, PipelineNode};
use crate::registry::NodeRegistry;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::any::Any;
use std::time::Duration;

/// Wire name of [`WindowNode::period`](WindowNode#structfield.period).
pub const PERIOD_FIELD: &str = "period";
/// Wire name of [`WindowNode::every`](WindowNode#structfield.every).
pub const EVERY_FIELD: &str = "every";
/// Wire name of [`WindowNode::align`](WindowNode#structfield.align).
pub const ALIGN_FIELD: &str = "align";
/// Wire name of [`WindowNode::fill_period`](WindowNode#structfield.fill_period).
pub const FILL_PERIOD_FIELD: &str = "fillPeriod";
/// Wire name of [`WindowNode::period_count`](WindowNode#structfield.period_count).
pub const PERIOD_COUNT_FIELD: &str = "periodCount";
/// Wire name of [`WindowNode::every_count`](WindowNode#structfield.every_count).
pub const EVERY_COUNT_FIELD: &str = "everyCount";

/// Which windowing mode a [`WindowNode`] is configured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
  /// No duration and no count is set.
  Unset,
  /// Only `period`/`every` are set.
  Time,
  /// Only `period_count`/`every_count` are set.
  Count,
  /// Both modes carry values.
  Mixed,
}

/// Pipeline node that batches a stream into time or count based windows.
///
/// Constructed zero-valued by [`WindowNode::new`]; populated through the
/// public fields, the fluent setters, or by decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowNode {
  /// Identity and chain base.
  pub chain: ChainNode,
  /// Span of a time based window.
  pub period: Duration,
  /// Emission cadence of a time based window.
  pub every: Duration,
  /// Align window boundaries to the epoch rather than the first point.
  pub align: bool,
  /// Wait for a full period of data before the first emission.
  pub fill_period: bool,
  /// Span of a count based window, in events.
  pub period_count: u64,
  /// Emission cadence of a count based window, in events.
  pub every_count: u64,
}

impl WindowNode {
  /// Creates a window node with an unset identity and zero-valued fields.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the span of a time based window.
  pub fn period(&mut self, period: Duration) -> &mut Self {
    self.period = period;
    self
  }

  /// Sets the emission cadence of a time based window.
  pub fn every(&mut self, every: Duration) -> &mut Self {
    self.every = every;
    self
  }

  /// Aligns window boundaries to the epoch.
  pub fn align(&mut self) -> &mut Self {
    self.align = true;
    self
  }

  /// Holds the first window back until a full period has accumulated.
  pub fn fill_period(&mut self) -> &mut Self {
    self.fill_period = true;
    self
  }

  /// Sets the span of a count based window.
  pub fn period_count(&mut self, count: u64) -> &mut Self {
    self.period_count = count;
    self
  }

  /// Sets the emission cadence of a count based window.
  pub fn every_count(&mut self, count: u64) -> &mut Self {
    self.every_count = count;
    self
  }

  /// Classifies which mode the node is configured in.
  pub fn mode(&self) -> WindowMode {
    let time = !self.period.is_zero() || !self.every.is_zero();
    let count = self.period_count != 0 || self.every_count != 0;
    match (time, count) {
      (false, false) => WindowMode::Unset,
      (true, false) => WindowMode::Time,
      (false, true) => WindowMode::Count,
      (true, true) => WindowMode::Mixed,
    }
  }

  /// Returns true if windows do not overlap (cadence equals span).
  pub fn is_tumbling(&self) -> bool {
    match self.mode() {
      WindowMode::Time => self.every == self.period,
      WindowMode::Count => self.every_count == self.period_count,
      WindowMode::Unset | WindowMode::Mixed => false,
    }
  }

  /// Returns true if windows overlap (cadence shorter than span).
  pub fn is_sliding(&self) -> bool {
    match self.mode() {
      WindowMode::Time => !self.every.is_zero() && self.every < self.period,
      WindowMode::Count => self.every_count != 0 && self.every_count < self.period_count,
      WindowMode::Unset | WindowMode::Mixed => false,
    }
  }

  /// Checks that the node describes exactly one meaningful windowing mode.
  ///
  /// The codec never calls this; it is up to the consumer of the graph.
  pub fn validate(&self) -> Result<(), WindowConfigError> {
    match self.mode() {
      WindowMode::Unset => Err(WindowConfigError::Unset),
      WindowMode::Mixed => Err(WindowConfigError::MixedModes),
      WindowMode::Time => {
        if self.period.is_zero() {
          return Err(WindowConfigError::NotPositive {
            field: PERIOD_FIELD,
          });
        }
        if self.every.is_zero() {
          return Err(WindowConfigError::NotPositive { field: EVERY_FIELD });
        }
        Ok(())
      }
      WindowMode::Count => {
        if self.align {
          return Err(WindowConfigError::AlignedCount);
        }
        if self.fill_period {
          return Err(WindowConfigError::FillPeriodCount);
        }
        if self.period_count == 0 {
          return Err(WindowConfigError::NotPositive {
            field: PERIOD_COUNT_FIELD,
          });
        }
        if self.every_count == 0 {
          return Err(WindowConfigError::NotPositive {
            field: EVERY_COUNT_FIELD,
          });
        }
        Ok(())
      }
    }
  }
}

impl PipelineNode for WindowNode {
  fn type_of(&self) -> &'static str {
    Self::TYPE_OF
  }

  fn chain(&self) -> &ChainNode {
    &self.chain
  }

  fn chain_mut(&mut self) -> &mut ChainNode {
    &mut self.chain
  }

  fn encode_fields(&self, fields: &mut FieldEncoder) {
    fields
      .duration(PERIOD_FIELD, self.period)
      .duration(EVERY_FIELD, self.every)
      .bool(ALIGN_FIELD, self.align)
      .bool(FILL_PERIOD_FIELD, self.fill_period)
      .count(PERIOD_COUNT_FIELD, self.period_count)
      .count(EVERY_COUNT_FIELD, self.every_count);
  }

  fn decode_fields(&mut self, fields: &FieldDecoder<'_>) -> Result<(), CodecError> {
    self.period = fields.duration(PERIOD_FIELD)?;
    self.every = fields.duration(EVERY_FIELD)?;
    self.align = fields.bool(ALIGN_FIELD)?;
    self.fill_period = fields.bool(FILL_PERIOD_FIELD)?;
    self.period_count = fields.count(PERIOD_COUNT_FIELD)?;
    self.every_count = fields.count(EVERY_COUNT_FIELD)?;
    Ok(())
  }

  fn as_any(&self) -> &dyn Any {
    self
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }

  fn clone_node(&self) -> Box<dyn PipelineNode> {
    Box::new(self.clone())
  }

  fn node_eq(&self, other: &dyn PipelineNode) -> bool {
    other.downcast_ref::<Self>().is_some_and(|other| self == other)
  }
}

impl NodeKind for WindowNode {
  const TYPE_OF: &'static str = "window";
}

impl Serialize for WindowNode {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    (self as &dyn PipelineNode).serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for WindowNode {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let mut node = WindowNode::new();
    NodeRegistry::global()
      .decode_into(&value, &mut node)
      .map_err(D::Error::custom)?;
    Ok(node)
  }
}
