//! Configuration for building and serializing pipeline graphs.

use serde::{Deserialize, Serialize};

/// Layout of JSON text produced by [`Pipeline::to_json`](crate::pipeline::Pipeline::to_json).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonFormat {
  /// Single line, no whitespace (default; byte-compatible with the node wire format).
  #[default]
  Compact,
  /// Indented, for humans.
  Pretty,
}

/// Settings for a [`PipelineBuilder`](crate::pipeline::PipelineBuilder).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use pipegraph::config::{JsonFormat, PipelineConfig};
///
/// let config = PipelineConfig::from_json_str(r#"{"format":"pretty"}"#).unwrap();
/// assert_eq!(config.format, JsonFormat::Pretty);
/// assert_eq!(config.first_id, 1);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PipelineConfig {
  /// First identity handed out by the builder. Zero marks an unset
  /// identity, so a zero here starts the builder at 1.
  pub first_id: u64,
  /// Output layout for pipeline documents.
  pub format: JsonFormat,
  /// Run `WindowNode::validate` on every window node when building.
  pub validate_windows: bool,
}

impl PipelineConfig {
  /// Creates a config with defaults.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the first identity handed out by the builder.
  pub fn with_first_id(mut self, first_id: u64) -> Self {
    self.first_id = first_id;
    self
  }

  /// Sets the output layout.
  pub fn with_format(mut self, format: JsonFormat) -> Self {
    self.format = format;
    self
  }

  /// Enables or disables window validation at build time.
  pub fn with_validate_windows(mut self, validate: bool) -> Self {
    self.validate_windows = validate;
    self
  }

  /// Parses a config from JSON text. Missing keys take their defaults.
  pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      first_id: 1,
      format: JsonFormat::Compact,
      validate_windows: false,
    }
  }
}
