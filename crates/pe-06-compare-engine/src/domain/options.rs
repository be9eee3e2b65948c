//! Comparison levels.

use serde::{Deserialize, Serialize};

/// Which block options participate in a fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyLevel {
    /// Block type only.
    None,
    /// Scalar options (strings, numbers, booleans).
    Simple,
    /// Every option and the permissions.
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildrenLevel {
    /// Containers ignore their children.
    None,
    Unordered,
    #[default]
    Ordered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventLevel {
    /// Edges are fingerprinted but their weight is reported empty.
    None,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompareOptions {
    pub property_level: PropertyLevel,
    pub children_level: ChildrenLevel,
    pub event_level: EventLevel,
}
