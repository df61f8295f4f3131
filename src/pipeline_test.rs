//! # Pipeline Test Suite
//!
//! Tests for the pipeline graph (insertion, linking, traversal), the
//! builder (identity assignment, chaining, validation), and the pipeline
//! document format.

use crate::config::{JsonFormat, PipelineConfig};
use crate::error::{CodecError, GraphError, WindowConfigError};
use crate::node::{IdGenerator, NodeId, PipelineNode};
use crate::pipeline::*;
use crate::registry::NodeRegistry;
use crate::window::WindowNode;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn window_with_id(id: u64) -> Box<dyn PipelineNode> {
  let mut w = WindowNode::new();
  w.set_id(NodeId::new(id));
  w.period(Duration::from_secs(60)).every(Duration::from_secs(60));
  Box::new(w)
}

fn three_node_chain() -> Pipeline {
  let mut pipeline = Pipeline::new();
  for id in 1..=3 {
    pipeline.insert(window_with_id(id)).unwrap();
  }
  pipeline.link(NodeId::new(1), NodeId::new(2)).unwrap();
  pipeline.link(NodeId::new(2), NodeId::new(3)).unwrap();
  pipeline
}

// ============================================================================
// Graph Structure Tests
// ============================================================================

#[test]
fn test_insert_rejects_duplicate_id() {
  let mut pipeline = Pipeline::new();
  pipeline.insert(window_with_id(1)).unwrap();
  assert!(matches!(
    pipeline.insert(window_with_id(1)),
    Err(GraphError::DuplicateId { id: 1 })
  ));
  assert_eq!(pipeline.len(), 1);
}

#[test]
fn test_link_validations() {
  let mut pipeline = three_node_chain();
  assert!(matches!(
    pipeline.link(NodeId::new(1), NodeId::new(9)),
    Err(GraphError::UnknownNode { id: 9 })
  ));
  assert!(matches!(
    pipeline.link(NodeId::new(2), NodeId::new(2)),
    Err(GraphError::SelfLoop { id: 2 })
  ));
  assert!(matches!(
    pipeline.link(NodeId::new(3), NodeId::new(1)),
    Err(GraphError::Cycle { parent: 3, child: 1 })
  ));
  // Re-linking an existing pair is a no-op.
  pipeline.link(NodeId::new(1), NodeId::new(2)).unwrap();
  assert_eq!(pipeline.edges().len(), 2);
}

#[test]
fn test_traversal() {
  let mut pipeline = three_node_chain();
  pipeline.insert(window_with_id(4)).unwrap();
  pipeline.link(NodeId::new(1), NodeId::new(4)).unwrap();

  assert_eq!(pipeline.children(NodeId::new(1)), vec![NodeId::new(2), NodeId::new(4)]);
  assert_eq!(pipeline.parents(NodeId::new(3)), vec![NodeId::new(2)]);
  assert_eq!(pipeline.roots(), vec![NodeId::new(1)]);
  assert_eq!(
    pipeline.sorted(),
    vec![NodeId::new(1), NodeId::new(2), NodeId::new(4), NodeId::new(3)]
  );
}

#[test]
fn test_sorted_respects_edges_over_insertion_order() {
  let mut pipeline = Pipeline::new();
  pipeline.insert(window_with_id(2)).unwrap();
  pipeline.insert(window_with_id(1)).unwrap();
  pipeline.link(NodeId::new(1), NodeId::new(2)).unwrap();
  assert_eq!(pipeline.sorted(), vec![NodeId::new(1), NodeId::new(2)]);
}

#[test]
fn test_typed_lookup() {
  let mut pipeline = three_node_chain();
  assert!(pipeline.get::<WindowNode>(NodeId::new(2)).is_some());
  assert!(pipeline.get::<WindowNode>(NodeId::new(7)).is_none());

  pipeline
    .get_mut::<WindowNode>(NodeId::new(2))
    .unwrap()
    .align();
  assert!(pipeline.get::<WindowNode>(NodeId::new(2)).unwrap().align);
  assert_eq!(pipeline.node(NodeId::new(3)).unwrap().type_of(), "window");
}

// ============================================================================
// Builder Tests
// ============================================================================

#[test]
fn test_builder_assigns_sequential_ids() {
  let mut builder = PipelineBuilder::new();
  let a = builder
    .window(|w| {
      w.period_count(10).every_count(10);
    })
    .unwrap();
  let b = builder.chain(a, WindowNode::new()).unwrap();
  assert_eq!(a, NodeId::new(1));
  assert_eq!(b, NodeId::new(2));

  let pipeline = builder.build().unwrap();
  assert_eq!(pipeline.edges(), &[Edge::new(a, b)]);
  assert_eq!(pipeline.get::<WindowNode>(a).unwrap().period_count, 10);
}

#[test]
fn test_builder_overwrites_preset_id() {
  let mut builder = PipelineBuilder::with_config(PipelineConfig::new().with_first_id(50));
  let mut w = WindowNode::new();
  w.set_id(NodeId::new(3));
  assert_eq!(builder.add(w).unwrap(), NodeId::new(50));
}

#[test]
fn test_builder_first_id_zero_starts_at_one() {
  let mut builder = PipelineBuilder::with_config(PipelineConfig::new().with_first_id(0));
  let id = builder.add(WindowNode::new()).unwrap();
  assert_eq!(id, NodeId::new(1));
  assert!(!id.is_unset());
}

#[test]
fn test_builder_reports_exhausted_ids() {
  let mut builder = PipelineBuilder::with_config(PipelineConfig::new().with_first_id(u64::MAX));
  assert_eq!(builder.add(WindowNode::new()).unwrap(), NodeId::new(u64::MAX));
  assert!(matches!(
    builder.add(WindowNode::new()),
    Err(GraphError::IdsExhausted)
  ));
  assert_eq!(builder.pipeline().len(), 1);
}

#[test]
fn test_builder_rejects_reidentified_node() {
  let mut builder = PipelineBuilder::new();
  let a = builder.add(WindowNode::new()).unwrap();
  let b = builder.add(WindowNode::new()).unwrap();
  builder.node_mut::<WindowNode>(b).unwrap().set_id(a);
  assert!(matches!(
    builder.build(),
    Err(GraphError::DuplicateId { id }) if id == a.as_u64()
  ));
}

#[test]
fn test_builder_add_rejects_identity_taken_by_reidentified_node() {
  let mut builder = PipelineBuilder::new();
  let a = builder.add(WindowNode::new()).unwrap();
  // The next identity the generator hands out is 2.
  builder.node_mut::<WindowNode>(a).unwrap().set_id(NodeId::new(2));
  assert!(matches!(
    builder.add(WindowNode::new()),
    Err(GraphError::DuplicateId { id: 2 })
  ));
  assert_eq!(builder.pipeline().len(), 1);
}

#[test]
fn test_built_pipeline_document_roundtrips() {
  let mut builder = PipelineBuilder::new();
  let a = builder.add(WindowNode::new()).unwrap();
  builder.chain(a, WindowNode::new()).unwrap();
  let pipeline = builder.build().unwrap();
  let json = pipeline.to_json(JsonFormat::Compact).unwrap();
  assert_eq!(
    Pipeline::from_json_str(NodeRegistry::global(), &json).unwrap(),
    pipeline
  );
}

#[test]
fn test_check_unique_ids() {
  let mut pipeline = three_node_chain();
  assert!(pipeline.check_unique_ids().is_ok());
  pipeline.node_mut(NodeId::new(3)).unwrap().set_id(NodeId::new(1));
  assert!(matches!(
    pipeline.check_unique_ids(),
    Err(GraphError::DuplicateId { id: 1 })
  ));
}

#[test]
fn test_builder_chain_unknown_parent() {
  let mut builder = PipelineBuilder::new();
  assert!(matches!(
    builder.chain(NodeId::new(99), WindowNode::new()),
    Err(GraphError::UnknownNode { id: 99 })
  ));
  assert!(builder.pipeline().is_empty());
}

#[test]
fn test_builder_node_mut_and_link() {
  let mut builder = PipelineBuilder::new();
  let a = builder.add(WindowNode::new()).unwrap();
  let b = builder.add(WindowNode::new()).unwrap();
  builder
    .node_mut::<WindowNode>(b)
    .unwrap()
    .period(Duration::from_secs(1));
  builder.link(a, b).unwrap();
  assert!(matches!(builder.link(b, a), Err(GraphError::Cycle { .. })));

  let pipeline = builder.build().unwrap();
  assert_eq!(
    pipeline.get::<WindowNode>(b).unwrap().period,
    Duration::from_secs(1)
  );
}

#[test]
fn test_builder_validates_windows_when_configured() {
  let config = PipelineConfig::new().with_validate_windows(true);
  let mut builder = PipelineBuilder::with_config(config);
  let id = builder
    .window(|w| {
      w.period(Duration::from_secs(60)).period_count(5);
    })
    .unwrap();
  match builder.build() {
    Err(GraphError::InvalidWindow { id: bad, source }) => {
      assert_eq!(bad, id.as_u64());
      assert_eq!(source, WindowConfigError::MixedModes);
    }
    other => panic!("expected InvalidWindow, got {:?}", other),
  }

  // Without validation the same configuration builds.
  let mut builder = PipelineBuilder::new();
  builder
    .window(|w| {
      w.period(Duration::from_secs(60)).period_count(5);
    })
    .unwrap();
  assert!(builder.build().is_ok());
}

#[test]
fn test_builders_sharing_generator_never_collide() {
  let ids = Arc::new(IdGenerator::new(1));
  let handles: Vec<_> = (0..4)
    .map(|_| {
      let ids = Arc::clone(&ids);
      thread::spawn(move || {
        let mut builder = PipelineBuilder::with_id_generator(PipelineConfig::default(), ids);
        (0..50)
          .map(|_| builder.add(WindowNode::new()).unwrap())
          .collect::<Vec<_>>()
      })
    })
    .collect();

  let mut seen = HashSet::new();
  for handle in handles {
    for id in handle.join().unwrap() {
      assert!(seen.insert(id));
    }
  }
  assert_eq!(seen.len(), 200);
}

// ============================================================================
// Document Tests
// ============================================================================

#[test]
fn test_pipeline_document_layout() {
  let mut pipeline = Pipeline::new();
  pipeline.insert(window_with_id(1)).unwrap();
  pipeline.insert(window_with_id(2)).unwrap();
  pipeline.link(NodeId::new(1), NodeId::new(2)).unwrap();

  let json = pipeline.to_json(JsonFormat::Compact).unwrap();
  assert_eq!(
    json,
    concat!(
      r#"{"nodes":["#,
      r#"{"typeOf":"window","ID":"1","period":60000000000,"every":60000000000,"align":false,"fillPeriod":false,"periodCount":0,"everyCount":0},"#,
      r#"{"typeOf":"window","ID":"2","period":60000000000,"every":60000000000,"align":false,"fillPeriod":false,"periodCount":0,"everyCount":0}"#,
      r#"],"edges":[{"parent":"1","child":"2"}]}"#
    )
  );
}

#[test]
fn test_pipeline_document_roundtrip() {
  let pipeline = three_node_chain();
  let pretty = pipeline.to_json(JsonFormat::Pretty).unwrap();
  assert!(pretty.contains('\n'));

  let decoded = Pipeline::from_json_str(NodeRegistry::global(), &pretty).unwrap();
  assert_eq!(decoded, pipeline);

  let via_serde: Pipeline = serde_json::from_value(pipeline.to_value()).unwrap();
  assert_eq!(via_serde, pipeline);
}

#[test]
fn test_pipeline_document_without_edges() {
  let json = r#"{"nodes":[{"typeOf":"window","ID":"0","period":1,"every":1,"align":false,"fillPeriod":false,"periodCount":0,"everyCount":0}]}"#;
  let pipeline = Pipeline::from_json_str(NodeRegistry::global(), json).unwrap();
  assert_eq!(pipeline.len(), 1);
  assert!(pipeline.edges().is_empty());
}

#[test]
fn test_pipeline_document_errors() {
  let registry = NodeRegistry::global();

  assert!(matches!(
    Pipeline::from_json_str(registry, "[]"),
    Err(GraphError::InvalidDocument(_))
  ));
  assert!(matches!(
    Pipeline::from_json_str(registry, r#"{"edges":[]}"#),
    Err(GraphError::InvalidDocument(_))
  ));
  assert!(matches!(
    Pipeline::from_json_str(registry, r#"{"nodes":[{"typeOf":"invalid","ID":"0"}]}"#),
    Err(GraphError::Codec(CodecError::UnknownType { .. }))
  ));
  assert!(matches!(
    Pipeline::from_json_str(registry, "{"),
    Err(GraphError::Codec(CodecError::Json(_)))
  ));

  let mut pipeline = three_node_chain();
  let mut value = pipeline.to_value();
  value["edges"] = serde_json::json!([
    {"parent": "1", "child": "2"},
    {"parent": "2", "child": "3"},
    {"parent": "3", "child": "1"}
  ]);
  assert!(matches!(
    Pipeline::from_value(registry, &value),
    Err(GraphError::Cycle { parent: 3, child: 1 })
  ));

  value["edges"] = serde_json::json!([{"parent": "1", "child": "5"}]);
  assert!(matches!(
    Pipeline::from_value(registry, &value),
    Err(GraphError::UnknownNode { id: 5 })
  ));

  value["edges"] = serde_json::json!([{"parent": 1, "child": "2"}]);
  assert!(matches!(
    Pipeline::from_value(registry, &value),
    Err(GraphError::InvalidDocument(_))
  ));

  pipeline.insert(window_with_id(8)).unwrap();
  let mut value = pipeline.to_value();
  value["nodes"][3]["ID"] = serde_json::json!("1");
  assert!(matches!(
    Pipeline::from_value(registry, &value),
    Err(GraphError::DuplicateId { id: 1 })
  ));
}

#[test]
fn test_builder_build_json_uses_configured_format() {
  let mut builder = PipelineBuilder::with_config(PipelineConfig::new().with_format(JsonFormat::Pretty));
  builder
    .window(|w| {
      w.every(Duration::from_secs(1));
    })
    .unwrap();
  let json = builder.build_json().unwrap();
  assert!(json.contains("\n"));
  assert!(json.contains(r#""typeOf": "window""#));
}
