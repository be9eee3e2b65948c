//! Publish-time validation results and the checks that need no I/O.
//!
//! Validation never stops at the first problem: every block is visited and
//! every finding is recorded.

use crate::domain::kind::BlockKind;
use crate::domain::options::{Behavior, HTTP_METHODS};
use crate::domain::tree::BlockTree;
use serde::Serialize;
use shared_types::entities::InputEventType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockValidation {
    pub id: String,
    pub tag: String,
    pub block_type: String,
    pub errors: Vec<String>,
}

impl BlockValidation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub blocks: Vec<BlockValidation>,
    /// Policy-level findings (duplicate tags, unknown block types).
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Empty report with one entry per block of `tree`.
    #[must_use]
    pub fn for_tree(tree: &BlockTree) -> Self {
        Self {
            is_valid: true,
            blocks: tree
                .nodes()
                .iter()
                .map(|node| BlockValidation {
                    id: node.id.to_string(),
                    tag: node.tag.clone(),
                    block_type: node.block_type().to_string(),
                    errors: Vec::new(),
                })
                .collect(),
            errors: Vec::new(),
        }
    }

    /// Report for a configuration that could not be materialized.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            blocks: Vec::new(),
            errors: vec![error.into()],
        }
    }

    pub fn add_block_error(&mut self, index: usize, message: impl Into<String>) {
        if let Some(block) = self.blocks.get_mut(index) {
            block.errors.push(message.into());
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Recompute `is_valid` from the findings.
    pub fn finish(&mut self) {
        self.is_valid = self.errors.is_empty() && self.blocks.iter().all(BlockValidation::is_valid);
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len() + self.blocks.iter().map(|b| b.errors.len()).sum::<usize>()
    }
}

/// Checks that only need the tree itself.
pub fn check_structure(tree: &BlockTree, report: &mut ValidationReport) {
    for tag in tree.duplicate_tags() {
        report.add_error(format!("Tag {tag} already exist"));
    }

    for (index, node) in tree.nodes().iter().enumerate() {
        for message in &node.option_errors {
            report.add_block_error(index, message.clone());
        }
        check_children(tree, index, report);
        check_options(&node.behavior, index, report);
    }

    for edge in tree.edges().iter().filter(|edge| !edge.implicit) {
        let config = &edge.config;
        let declared_by = edge.declared_by;
        let Some(source) = tree.by_tag(&config.source) else {
            report.add_block_error(declared_by, format!("Event source \"{}\" does not exist", config.source));
            continue;
        };
        let Some(target) = tree.by_tag(&config.target) else {
            report.add_block_error(declared_by, format!("Event target \"{}\" does not exist", config.target));
            continue;
        };
        if !source.produces(&config.output) {
            report.add_block_error(
                declared_by,
                format!("{} does not emit \"{}\"", source.tag, config.output),
            );
        }
        if config.input == InputEventType::Unknown || !target.about().accepts(config.input) {
            report.add_block_error(
                declared_by,
                format!("{} does not accept \"{}\"", target.tag, config.input.as_str()),
            );
        }
    }
}

fn check_children(tree: &BlockTree, index: usize, report: &mut ValidationReport) {
    let node = tree.node(index);
    for &child in &node.children {
        let child_kind = tree.node(child).kind;
        let allowed = match node.kind {
            BlockKind::InterfaceContainer | BlockKind::InterfaceStep => true,
            BlockKind::RequestVcDocument => child_kind == BlockKind::DocumentValidator,
            BlockKind::CalculateContainer => child_kind == BlockKind::CalculateMathAddon,
            _ => false,
        };
        if !allowed {
            report.add_block_error(
                index,
                format!("{} cannot contain {}", node.block_type(), child_kind.block_type()),
            );
        }
    }
}

fn check_options(behavior: &Behavior, index: usize, report: &mut ValidationReport) {
    match behavior {
        Behavior::HttpRequest(opts) => {
            if opts.url.trim().is_empty() {
                report.add_block_error(index, "Option \"url\" must be set");
            }
            if !HTTP_METHODS.contains(&opts.method.to_uppercase().as_str()) {
                report.add_block_error(
                    index,
                    "Option \"method\" must be \"GET\", \"POST\", \"PUT\", \"PATCH\" or \"DELETE\"",
                );
            }
        }
        Behavior::Button(opts) => {
            let Some(meta) = &opts.ui_meta_data else {
                report.add_block_error(index, "Option \"uiMetaData\" does not set");
                return;
            };
            let Some(buttons) = &meta.buttons else {
                report.add_block_error(index, "Option \"uiMetaData.buttons\" must be an array");
                return;
            };
            for button in buttons {
                if button.tag.as_deref().map_or(true, str::is_empty) {
                    report.add_block_error(index, "Option \"tag\" does not set");
                }
                match &button.filters {
                    Some(filters) => {
                        for filter in filters {
                            if filter.filter_type.is_none() {
                                report.add_block_error(index, "Option \"type\" does not set");
                            }
                            if filter.field.is_none() {
                                report.add_block_error(index, "Option \"field\" does not set");
                            }
                        }
                    }
                    None => {
                        report.add_block_error(index, "Option \"button.filters\" must be an array")
                    }
                }
                match button.button_type.as_deref() {
                    Some("selector") => {}
                    Some("selector-dialog") => {
                        if button.title.is_none() {
                            report.add_block_error(index, "Option \"title\" does not set");
                        }
                        if button.description.is_none() {
                            report.add_block_error(index, "Option \"description\" does not set");
                        }
                    }
                    _ => report.add_block_error(
                        index,
                        "Option \"type\" must be a \"selector|selector-dialog\"",
                    ),
                }
            }
        }
        Behavior::RequestVcDocument(opts) => {
            if opts.schema.as_deref().map_or(true, str::is_empty) {
                report.add_block_error(index, "Option \"schema\" does not set");
            }
        }
        Behavior::Switch(opts) => {
            if opts.conditions.is_empty() {
                report.add_block_error(index, "Option \"conditions\" does not set");
            }
            for condition in &opts.conditions {
                if condition.tag.is_empty() {
                    report.add_block_error(index, "Condition tag does not set");
                }
            }
        }
        Behavior::CalculateContainer(opts) => {
            if opts.output_schema.is_none() {
                report.add_block_error(index, "Option \"outputSchema\" does not set");
            }
        }
        Behavior::MintDocument(opts) | Behavior::RetirementDocument(opts) => {
            if opts.token_id.as_deref().map_or(true, str::is_empty) {
                report.add_block_error(index, "Option \"tokenId\" does not set");
            }
            if opts.rule.as_deref().map_or(true, str::is_empty) {
                report.add_block_error(index, "Option \"rule\" does not set");
            }
        }
        _ => {}
    }
}
