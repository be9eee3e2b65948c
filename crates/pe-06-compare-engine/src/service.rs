//! Compare engine service.

use crate::domain::model::{EdgeModel, PolicyModel};
use crate::domain::options::CompareOptions;
use crate::domain::result::{BlockComparison, CompareResult, CompareStatus, EdgeComparison};
use crate::ports::inbound::PolicyComparator;
use shared_types::entities::BlockDefinition;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CompareEngine {
    options: CompareOptions,
}

impl CompareEngine {
    #[must_use]
    pub fn new(options: CompareOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    fn compare_blocks(left: &PolicyModel, right: &PolicyModel) -> Vec<BlockComparison> {
        let mut out = Vec::with_capacity(left.blocks.len());
        for block in &left.blocks {
            let comparison = match right.block(&block.key) {
                Some(other) => BlockComparison {
                    key: block.key.clone(),
                    block_type: block.block_type.clone(),
                    status: if other.weight == block.weight {
                        CompareStatus::Equal
                    } else {
                        CompareStatus::Different
                    },
                    properties_equal: other.property_weight == block.property_weight,
                },
                None => BlockComparison {
                    key: block.key.clone(),
                    block_type: block.block_type.clone(),
                    status: CompareStatus::LeftOnly,
                    properties_equal: false,
                },
            };
            out.push(comparison);
        }
        for block in &right.blocks {
            if left.block(&block.key).is_none() {
                out.push(BlockComparison {
                    key: block.key.clone(),
                    block_type: block.block_type.clone(),
                    status: CompareStatus::RightOnly,
                    properties_equal: false,
                });
            }
        }
        out
    }

    fn compare_edges(left: &PolicyModel, right: &PolicyModel) -> Vec<EdgeComparison> {
        let index = |edges: &[EdgeModel]| -> HashMap<String, String> {
            edges.iter().map(|e| (e.key(), e.hash.clone())).collect()
        };
        let right_edges = index(&right.edges);
        let left_edges = index(&left.edges);

        let mut out: Vec<EdgeComparison> = left
            .edges
            .iter()
            .map(|edge| {
                let key = edge.key();
                let status = match right_edges.get(&key) {
                    Some(hash) if *hash == edge.hash => CompareStatus::Equal,
                    Some(_) => CompareStatus::Different,
                    None => CompareStatus::LeftOnly,
                };
                EdgeComparison { key, status }
            })
            .collect();
        out.extend(
            right
                .edges
                .iter()
                .map(EdgeModel::key)
                .filter(|key| !left_edges.contains_key(key))
                .map(|key| EdgeComparison {
                    key,
                    status: CompareStatus::RightOnly,
                }),
        );
        out
    }
}

impl PolicyComparator for CompareEngine {
    fn fingerprint(&self, root: &BlockDefinition) -> PolicyModel {
        PolicyModel::build(root, &self.options)
    }

    fn compare(&self, left: &BlockDefinition, right: &BlockDefinition) -> CompareResult {
        let left = self.fingerprint(left);
        let right = self.fingerprint(right);
        let result = CompareResult::from_parts(
            Self::compare_blocks(&left, &right),
            Self::compare_edges(&left, &right),
        );
        debug!(
            blocks = result.blocks.len(),
            edges = result.edges.len(),
            rate = result.rate,
            "[pe-06] policies compared"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::options::{ChildrenLevel, EventLevel, PropertyLevel};
    use serde_json::json;
    use shared_types::entities::{EventConfig, InputEventType};

    fn policy(threshold: i64) -> BlockDefinition {
        BlockDefinition::new("interfaceContainerBlock", "root")
            .with_child(
                BlockDefinition::new("requestVcDocumentBlock", "req")
                    .with_option("schema", json!("#reading"))
                    .with_event(EventConfig::new("req", "check", "RunEvent", InputEventType::RunEvent)),
            )
            .with_child(
                BlockDefinition::new("switchBlock", "check").with_option(
                    "conditions",
                    json!([{"tag": "big", "type": "equal", "value": format!("value > {threshold}")}]),
                ),
            )
    }

    #[test]
    fn test_identical_policies_are_equal() {
        let engine = CompareEngine::default();
        let result = engine.compare(&policy(10), &policy(10));
        assert!(result.is_equal());
        assert_eq!(result.rate, 100.0);
        assert_eq!(
            engine.fingerprint(&policy(10)).weight(),
            engine.fingerprint(&policy(10)).weight()
        );
    }

    #[test]
    fn test_change_propagates_to_ancestors_and_edges() {
        let result = CompareEngine::default().compare(&policy(10), &policy(20));
        assert_eq!(result.status_of("check"), Some(CompareStatus::Different));
        assert_eq!(result.status_of("root"), Some(CompareStatus::Different));
        assert_eq!(result.status_of("req"), Some(CompareStatus::Equal));
        assert_eq!(result.edges[0].status, CompareStatus::Different);
        assert!(result.rate < 100.0);
    }

    #[test]
    fn test_simple_level_ignores_structured_options() {
        let engine = CompareEngine::new(CompareOptions {
            property_level: PropertyLevel::Simple,
            ..CompareOptions::default()
        });
        assert!(engine.compare(&policy(10), &policy(20)).is_equal());
    }

    #[test]
    fn test_children_order() {
        let a = BlockDefinition::new("interfaceContainerBlock", "root")
            .with_child(BlockDefinition::new("buttonBlock", "x"))
            .with_child(BlockDefinition::new("buttonBlock", "y").with_option("k", json!(1)));
        let b = BlockDefinition::new("interfaceContainerBlock", "root")
            .with_child(BlockDefinition::new("buttonBlock", "y").with_option("k", json!(1)))
            .with_child(BlockDefinition::new("buttonBlock", "x"));

        let ordered = CompareEngine::default();
        assert_eq!(
            ordered.compare(&a, &b).status_of("root"),
            Some(CompareStatus::Different)
        );
        let unordered = CompareEngine::new(CompareOptions {
            children_level: ChildrenLevel::Unordered,
            ..CompareOptions::default()
        });
        assert!(unordered.compare(&a, &b).is_equal());
    }

    #[test]
    fn test_one_sided_blocks_and_event_weight() {
        let left = policy(10);
        let right = BlockDefinition::new("interfaceContainerBlock", "root")
            .with_child(BlockDefinition::new("buttonBlock", "extra"));
        let result = CompareEngine::default().compare(&left, &right);
        assert_eq!(result.status_of("req"), Some(CompareStatus::LeftOnly));
        assert_eq!(result.status_of("extra"), Some(CompareStatus::RightOnly));
        assert_eq!(result.edges[0].status, CompareStatus::LeftOnly);

        let engine = CompareEngine::new(CompareOptions {
            event_level: EventLevel::None,
            ..CompareOptions::default()
        });
        let model = engine.fingerprint(&left);
        assert!(model.edges[0].weight.is_empty());
    }
}
