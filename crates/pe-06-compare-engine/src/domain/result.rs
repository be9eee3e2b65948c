//! Comparison outcome.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareStatus {
    Equal,
    Different,
    LeftOnly,
    RightOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockComparison {
    pub key: String,
    pub block_type: String,
    pub status: CompareStatus,
    /// Own fields match even when the subtree does not.
    pub properties_equal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeComparison {
    pub key: String,
    pub status: CompareStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResult {
    pub blocks: Vec<BlockComparison>,
    pub edges: Vec<EdgeComparison>,
    /// Share of equal items over all compared items, in percent.
    pub rate: f64,
}

impl CompareResult {
    #[must_use]
    pub fn from_parts(blocks: Vec<BlockComparison>, edges: Vec<EdgeComparison>) -> Self {
        let total = blocks.len() + edges.len();
        let equal = blocks
            .iter()
            .map(|b| b.status)
            .chain(edges.iter().map(|e| e.status))
            .filter(|status| *status == CompareStatus::Equal)
            .count();
        let rate = if total == 0 {
            100.0
        } else {
            equal as f64 * 100.0 / total as f64
        };
        Self { blocks, edges, rate }
    }

    #[must_use]
    pub fn is_equal(&self) -> bool {
        self.blocks
            .iter()
            .map(|b| b.status)
            .chain(self.edges.iter().map(|e| e.status))
            .all(|status| status == CompareStatus::Equal)
    }

    #[must_use]
    pub fn status_of(&self, key: &str) -> Option<CompareStatus> {
        self.blocks.iter().find(|b| b.key == key).map(|b| b.status)
    }
}
