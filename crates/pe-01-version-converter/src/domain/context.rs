//! Position of a node within its parent, handed to every step.

use serde_json::{Map, Value};

/// Parent and sibling information for the node being migrated.
///
/// Siblings are captured before any of them is converted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeContext {
    pub parent_tag: Option<String>,
    pub parent_type: Option<String>,
    pub index: Option<usize>,
    pub prev_tag: Option<String>,
    pub next_tag: Option<String>,
}

impl NodeContext {
    /// Context of the configuration root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.index.is_none()
    }

    /// Context for the `index`-th child of `parent`, given the tags of all children.
    #[must_use]
    pub fn child_of(parent: &Map<String, Value>, index: usize, sibling_tags: &[Option<String>]) -> Self {
        Self::child_of_parts(
            str_field(parent, "tag"),
            str_field(parent, "blockType"),
            index,
            sibling_tags,
        )
    }

    pub(crate) fn child_of_parts(
        parent_tag: Option<String>,
        parent_type: Option<String>,
        index: usize,
        sibling_tags: &[Option<String>],
    ) -> Self {
        Self {
            parent_tag,
            parent_type,
            index: Some(index),
            prev_tag: index
                .checked_sub(1)
                .and_then(|prev| sibling_tags.get(prev).cloned().flatten()),
            next_tag: sibling_tags.get(index + 1).cloned().flatten(),
        }
    }
}

pub(crate) fn str_field(block: &Map<String, Value>, key: &str) -> Option<String> {
    block.get(key).and_then(Value::as_str).map(str::to_string)
}
