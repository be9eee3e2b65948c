//! Fingerprinted view of one policy graph.

use crate::domain::fingerprint::Fingerprinter;
use crate::domain::options::{ChildrenLevel, CompareOptions, EventLevel, PropertyLevel};
use serde::Serialize;
use serde_json::Value;
use shared_types::entities::{BlockDefinition, EventConfig};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockModel {
    /// Comparison key: the tag, or the tree position for untagged blocks.
    pub key: String,
    pub block_type: String,
    pub depth: usize,
    /// Own fields only.
    pub property_weight: String,
    /// Own fields folded with the children, per the children level.
    pub weight: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeModel {
    pub source: String,
    pub target: String,
    pub input: String,
    pub output: String,
    pub actor: String,
    pub disabled: bool,
    /// Empty when events are not compared.
    pub weight: String,
    pub start_weight: Option<String>,
    pub end_weight: Option<String>,
    #[serde(skip)]
    pub hash: String,
}

impl EdgeModel {
    /// Edges pair up across policies by endpoint tags and output name.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}->{}:{}", self.source, self.output, self.target, self.input)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyModel {
    pub blocks: Vec<BlockModel>,
    pub edges: Vec<EdgeModel>,
    by_key: HashMap<String, usize>,
}

impl PolicyModel {
    #[must_use]
    pub fn build(root: &BlockDefinition, options: &CompareOptions) -> Self {
        let mut model = Self::default();
        let mut events = Vec::new();
        model.visit(root, "0", 0, options, &mut events);

        model.edges = events
            .into_iter()
            .map(|config| model.edge(config, options))
            .collect();
        model
    }

    #[must_use]
    pub fn block(&self, key: &str) -> Option<&BlockModel> {
        self.by_key.get(key).map(|&i| &self.blocks[i])
    }

    /// Root fingerprint; equal roots mean structurally equal trees.
    #[must_use]
    pub fn weight(&self) -> Option<&str> {
        self.blocks.first().map(|b| b.weight.as_str())
    }

    fn visit<'d>(
        &mut self,
        definition: &'d BlockDefinition,
        position: &str,
        depth: usize,
        options: &CompareOptions,
        events: &mut Vec<&'d EventConfig>,
    ) -> String {
        let key = definition
            .tag
            .clone()
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| format!("#{position}"));
        let index = self.blocks.len();
        self.blocks.push(BlockModel {
            key: key.clone(),
            block_type: definition.block_type.clone(),
            depth,
            property_weight: property_weight(definition, options.property_level),
            weight: String::new(),
        });
        self.by_key.entry(key).or_insert(index);
        events.extend(definition.events.iter());

        let mut children: Vec<String> = definition
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                self.visit(child, &format!("{position}.{i}"), depth + 1, options, events)
            })
            .collect();

        let mut print = Fingerprinter::new();
        print.feed(&self.blocks[index].property_weight);
        match options.children_level {
            ChildrenLevel::None => {}
            ChildrenLevel::Unordered => {
                children.sort();
                for child in &children {
                    print.feed(child);
                }
            }
            ChildrenLevel::Ordered => {
                for child in &children {
                    print.feed(child);
                }
            }
        }
        let weight = print.finish();
        self.blocks[index].weight = weight.clone();
        weight
    }

    fn edge(&self, config: &EventConfig, options: &CompareOptions) -> EdgeModel {
        let start = self.block(&config.source).map(|b| b.weight.clone());
        let end = self.block(&config.target).map(|b| b.weight.clone());
        let actor = config.actor.map(|a| a.as_str()).unwrap_or_default();

        let mut print = Fingerprinter::new();
        if let Some(start) = &start {
            print.feed(start);
        }
        if let Some(end) = &end {
            print.feed(end);
        }
        print
            .feed(actor)
            .feed(if config.disabled { "true" } else { "false" })
            .feed(config.input.as_str())
            .feed(&config.output);
        let hash = print.finish();

        EdgeModel {
            source: config.source.clone(),
            target: config.target.clone(),
            input: config.input.as_str().to_string(),
            output: config.output.clone(),
            actor: actor.to_string(),
            disabled: config.disabled,
            weight: match options.event_level {
                EventLevel::All => hash.clone(),
                EventLevel::None => String::new(),
            },
            start_weight: start,
            end_weight: end,
            hash,
        }
    }
}

fn property_weight(definition: &BlockDefinition, level: PropertyLevel) -> String {
    let mut print = Fingerprinter::new();
    print.feed(&definition.block_type);
    match level {
        PropertyLevel::None => {}
        PropertyLevel::Simple => {
            let mut keys: Vec<&String> = definition
                .options
                .iter()
                .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
                .map(|(k, _)| k)
                .collect();
            keys.sort();
            for key in keys {
                print.feed(key).feed_value(&definition.options[key]);
            }
        }
        PropertyLevel::All => {
            let mut keys: Vec<&String> = definition.options.keys().collect();
            keys.sort();
            for key in keys {
                print.feed(key).feed_value(&definition.options[key]);
            }
            let mut permissions = definition.permissions.clone();
            permissions.sort();
            for permission in &permissions {
                print.feed(permission);
            }
        }
    }
    print.finish()
}
