//! Arena-backed materialized block tree.
//!
//! Nodes are stored in pre-order, so index 0 is the root and every parent
//! precedes its children. Parents are plain indices (non-owning).

use crate::domain::errors::TreeError;
use crate::domain::kind::{BlockAbout, BlockKind};
use crate::domain::options::Behavior;
use serde_json::{Map, Value};
use shared_types::entities::output_events::RUN_EVENT;
use shared_types::entities::{BlockDefinition, BlockId, EventConfig, InputEventType};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BlockNode {
    pub id: BlockId,
    pub tag: String,
    pub kind: BlockKind,
    pub behavior: Behavior,
    pub permissions: Vec<String>,
    /// Raw options, kept for rendering (`uiMetaData` and friends).
    pub options: Map<String, Value>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub option_errors: Vec<String>,
    /// Emits an implicit `RunEvent` to the next sibling.
    pub default_active: bool,
}

impl BlockNode {
    #[must_use]
    pub fn about(&self) -> BlockAbout {
        self.kind.about()
    }

    #[must_use]
    pub fn block_type(&self) -> &'static str {
        self.kind.block_type()
    }

    /// Whether the block can emit `output`.
    #[must_use]
    pub fn produces(&self, output: &str) -> bool {
        self.about().output.contains(&output)
            || self.behavior.dynamic_outputs().contains(&output)
    }

    /// `uiMetaData` option, or an empty object.
    #[must_use]
    pub fn ui_meta_data(&self) -> Value {
        self.options
            .get("uiMetaData")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// A routed edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEdge {
    pub config: EventConfig,
    /// Index of the block whose definition declared the edge.
    pub declared_by: usize,
    /// Added for `defaultActive` blocks rather than declared.
    pub implicit: bool,
}

#[derive(Debug, Clone)]
pub struct BlockTree {
    nodes: Vec<BlockNode>,
    by_tag: HashMap<String, usize>,
    by_id: HashMap<BlockId, usize>,
    edges: Vec<EventEdge>,
    edges_by_source: HashMap<String, Vec<usize>>,
    duplicate_tags: Vec<String>,
}

impl BlockTree {
    /// Materialize `root`, assigning a fresh id to every node.
    pub fn build(root: &BlockDefinition) -> Result<Self, TreeError> {
        let mut unknown = Vec::new();
        collect_unknown(root, &mut unknown);
        if !unknown.is_empty() {
            return Err(TreeError::UnknownBlockTypes(unknown));
        }

        let mut tree = Self {
            nodes: Vec::with_capacity(root.node_count()),
            by_tag: HashMap::new(),
            by_id: HashMap::new(),
            edges: Vec::new(),
            edges_by_source: HashMap::new(),
            duplicate_tags: Vec::new(),
        };
        tree.visit(root, None);
        tree.add_default_edges();
        tree.index_edges();
        Ok(tree)
    }

    /// Parse a stored `config` value and build it.
    pub fn from_config(config: &Value) -> Result<Self, TreeError> {
        if config.is_null() {
            return Err(TreeError::EmptyPolicy);
        }
        let root = BlockDefinition::from_config(config)
            .map_err(|e| TreeError::InvalidConfig(e.to_string()))?;
        Self::build(&root)
    }

    fn visit(&mut self, definition: &BlockDefinition, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        let kind = BlockKind::from_block_type(&definition.block_type)
            .unwrap_or(BlockKind::InterfaceContainer);
        let id = BlockId::generate();
        let tag = definition
            .tag
            .as_deref()
            .filter(|tag| !tag.is_empty())
            .map_or_else(|| id.to_string(), str::to_string);
        let (behavior, option_errors) = Behavior::parse(kind, &definition.options);
        let default_active = definition
            .options
            .get("defaultActive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if self.by_tag.contains_key(&tag) {
            self.duplicate_tags.push(tag.clone());
        } else {
            self.by_tag.insert(tag.clone(), index);
        }
        self.by_id.insert(id.clone(), index);
        self.nodes.push(BlockNode {
            id,
            tag,
            kind,
            behavior,
            permissions: definition.permissions.clone(),
            options: definition.options.clone(),
            parent,
            children: Vec::with_capacity(definition.children.len()),
            option_errors,
            default_active,
        });

        for event in &definition.events {
            self.edges.push(EventEdge {
                config: event.clone(),
                declared_by: index,
                implicit: false,
            });
        }
        for child in &definition.children {
            let child_index = self.visit(child, Some(index));
            self.nodes[index].children.push(child_index);
        }
        index
    }

    fn add_default_edges(&mut self) {
        for index in 0..self.nodes.len() {
            let node = &self.nodes[index];
            if !node.default_active || !node.about().default_event {
                continue;
            }
            if let Some(next) = self.next_sibling(index) {
                let edge = EventConfig::new(
                    node.tag.clone(),
                    self.nodes[next].tag.clone(),
                    RUN_EVENT,
                    InputEventType::RunEvent,
                );
                self.edges.push(EventEdge {
                    config: edge,
                    declared_by: index,
                    implicit: true,
                });
            }
        }
    }

    fn index_edges(&mut self) {
        for (position, edge) in self.edges.iter().enumerate() {
            self.edges_by_source
                .entry(edge.config.source.clone())
                .or_default()
                .push(position);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, index: usize) -> &BlockNode {
        &self.nodes[index]
    }

    #[must_use]
    pub fn nodes(&self) -> &[BlockNode] {
        &self.nodes
    }

    #[must_use]
    pub fn root(&self) -> &BlockNode {
        &self.nodes[0]
    }

    #[must_use]
    pub fn index_of_tag(&self, tag: &str) -> Option<usize> {
        self.by_tag.get(tag).copied()
    }

    #[must_use]
    pub fn index_of_id(&self, id: &BlockId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    #[must_use]
    pub fn by_tag(&self, tag: &str) -> Option<&BlockNode> {
        self.index_of_tag(tag).map(|index| &self.nodes[index])
    }

    #[must_use]
    pub fn by_id(&self, id: &BlockId) -> Option<&BlockNode> {
        self.index_of_id(id).map(|index| &self.nodes[index])
    }

    /// Ancestry of `index`: the block itself first, the root last.
    #[must_use]
    pub fn parents(&self, index: usize) -> Vec<usize> {
        let mut chain = vec![index];
        let mut current = self.nodes[index].parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.nodes[parent].parent;
        }
        chain
    }

    /// Position of `index` among its parent's children.
    #[must_use]
    pub fn child_position(&self, index: usize) -> Option<usize> {
        let parent = self.nodes[index].parent?;
        self.nodes[parent].children.iter().position(|&c| c == index)
    }

    #[must_use]
    pub fn next_sibling(&self, index: usize) -> Option<usize> {
        let parent = self.nodes[index].parent?;
        let position = self.child_position(index)?;
        self.nodes[parent].children.get(position + 1).copied()
    }

    /// All edges: declared ones in pre-order, then implicit ones.
    #[must_use]
    pub fn edges(&self) -> &[EventEdge] {
        &self.edges
    }

    /// Edges leaving `tag`, in routing order.
    pub fn edges_from<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a EventEdge> + 'a {
        self.edges_by_source
            .get(tag)
            .into_iter()
            .flatten()
            .map(move |&position| &self.edges[position])
    }

    /// Tags that appear on more than one block.
    #[must_use]
    pub fn duplicate_tags(&self) -> &[String] {
        &self.duplicate_tags
    }

    /// Indices of `kind` blocks, in pre-order.
    pub fn of_kind(&self, kind: BlockKind) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.kind == kind)
            .map(|(index, _)| index)
    }
}

fn collect_unknown(definition: &BlockDefinition, out: &mut Vec<String>) {
    if BlockKind::from_block_type(&definition.block_type).is_none()
        && !out.contains(&definition.block_type)
    {
        out.push(definition.block_type.clone());
    }
    for child in &definition.children {
        collect_unknown(child, out);
    }
}
