//! # Error Types
//!
//! Errors raised while encoding, decoding, registering, and assembling
//! pipeline nodes.
//!
//! ## Overview
//!
//! - [`CodecError`]: a node envelope could not be decoded (bad tag, bad
//!   identity, or a malformed type-specific field)
//! - [`RegistryError`]: a node kind could not be registered
//! - [`WindowConfigError`]: a window node is configured inconsistently
//! - [`GraphError`]: a pipeline graph is structurally invalid
//!
//! Every error is recoverable at the call site. Nothing is retried
//! internally; callers that want to retry re-fetch and re-parse.

use thiserror::Error;

/// Error produced when a node envelope cannot be decoded.
///
/// Field-level variants carry the wire name of the offending field so the
/// caller can point at the exact attribute that failed.
#[derive(Error, Debug)]
pub enum CodecError {
  /// The payload is not a JSON object.
  #[error("node payload must be a JSON object, found {found}")]
  NotAnObject {
    /// JSON kind that was found instead (e.g. "array").
    found: &'static str,
  },
  /// The `typeOf` discriminator is absent or not a string.
  #[error("missing node type: \"typeOf\" must be a string")]
  MissingType,
  /// The `typeOf` discriminator names no registered node kind.
  #[error("unknown node type {type_of:?}")]
  UnknownType {
    /// The tag found on the wire.
    type_of: String,
  },
  /// The payload names a registered kind other than the one being decoded.
  #[error("node type mismatch: expected {expected:?}, found {found:?}")]
  TypeMismatch {
    /// Tag of the concrete node being decoded into.
    expected: &'static str,
    /// Tag found on the wire.
    found: String,
  },
  /// The `ID` field is absent.
  #[error("missing node identity: \"ID\" is required")]
  MissingId,
  /// The `ID` field is not a base-10 unsigned integer string.
  #[error("invalid node identity {value}: expected a decimal string")]
  InvalidId {
    /// The raw JSON value found on the wire.
    value: String,
  },
  /// A type-specific field is absent.
  #[error("missing field {field:?}")]
  MissingField {
    /// Wire name of the field.
    field: &'static str,
  },
  /// A type-specific field has the wrong JSON shape or an out-of-range value.
  #[error("invalid field {field:?}: {reason}")]
  InvalidField {
    /// Wire name of the field.
    field: &'static str,
    /// What was wrong with it.
    reason: String,
  },
  /// The input is not valid JSON at all.
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl CodecError {
  /// Returns the wire name of the offending field, if the error is field-level.
  pub fn field(&self) -> Option<&str> {
    match self {
      CodecError::MissingType
      | CodecError::UnknownType { .. }
      | CodecError::TypeMismatch { .. } => Some("typeOf"),
      CodecError::MissingId | CodecError::InvalidId { .. } => Some("ID"),
      CodecError::MissingField { field } | CodecError::InvalidField { field, .. } => Some(*field),
      CodecError::NotAnObject { .. } | CodecError::Json(_) => None,
    }
  }
}

/// Error produced when registering node kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
  /// A factory is already registered under this tag.
  #[error("node type {type_of:?} is already registered")]
  DuplicateType {
    /// The conflicting tag.
    type_of: &'static str,
  },
}

/// Inconsistent window configuration, reported by `WindowNode::validate`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowConfigError {
  /// Both the duration fields and the count fields are populated.
  #[error("window mixes time based and count based configuration")]
  MixedModes,
  /// Neither mode is populated.
  #[error("window has neither a period nor a period count")]
  Unset,
  /// Alignment only applies to time based windows.
  #[error("count based windows cannot be aligned")]
  AlignedCount,
  /// Fill-period only applies to time based windows.
  #[error("count based windows cannot use fill period")]
  FillPeriodCount,
  /// The span or cadence of the populated mode is zero.
  #[error("window {field} must be greater than zero")]
  NotPositive {
    /// Wire name of the zero field.
    field: &'static str,
  },
}

/// Error produced while building or decoding a pipeline graph.
#[derive(Error, Debug)]
pub enum GraphError {
  /// A node in the document failed to decode.
  #[error(transparent)]
  Codec(#[from] CodecError),
  /// Two nodes share an identity.
  #[error("duplicate node id {id}")]
  DuplicateId {
    /// The repeated identity.
    id: u64,
  },
  /// An edge references a node that is not in the pipeline.
  #[error("unknown node id {id}")]
  UnknownNode {
    /// The missing identity.
    id: u64,
  },
  /// An edge links a node to itself.
  #[error("node {id} cannot be linked to itself")]
  SelfLoop {
    /// The node identity.
    id: u64,
  },
  /// An edge would close a cycle.
  #[error("linking {parent} -> {child} would create a cycle")]
  Cycle {
    /// Parent identity.
    parent: u64,
    /// Child identity.
    child: u64,
  },
  /// The identity generator has handed out every identity it can.
  #[error("node identities exhausted")]
  IdsExhausted,
  /// The pipeline document does not have the expected shape.
  #[error("invalid pipeline document: {0}")]
  InvalidDocument(String),
  /// A window node failed validation while building.
  #[error("window node {id}: {source}")]
  InvalidWindow {
    /// The window node identity.
    id: u64,
    /// Why the configuration was rejected.
    source: WindowConfigError,
  },
}
