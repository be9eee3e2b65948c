//! # Policy Converter
//!
//! Walks a configuration tree pre-order and applies every pending step.

use crate::domain::context::{str_field, NodeContext};
use crate::domain::errors::ConversionError;
use crate::domain::steps::{default_steps, MigrationStep};
use crate::domain::version::CodeVersion;
use crate::ports::inbound::PolicyMigration;
use crate::ENGINE_CODE_VERSION;
use serde_json::Value;
use shared_types::entities::Policy;
use tracing::{debug, info};

/// Outcome of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// `codeVersion` before conversion.
    pub from: Option<String>,
    /// `codeVersion` after conversion.
    pub to: String,
    /// Steps that were eligible for this policy, in order.
    pub applied_steps: Vec<&'static str>,
    /// Blocks changed by at least one step.
    pub blocks_changed: usize,
    pub blocks_visited: usize,
}

impl ConversionReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.blocks_changed == 0 && self.from.as_deref() == Some(self.to.as_str())
    }
}

/// Ordered migration chain bound to the engine's current version.
pub struct PolicyConverter {
    steps: Vec<Box<dyn MigrationStep>>,
    current: CodeVersion,
}

impl PolicyConverter {
    /// Converter with the built-in chain targeting [`ENGINE_CODE_VERSION`].
    pub fn new() -> Result<Self, ConversionError> {
        Self::with_steps(ENGINE_CODE_VERSION, default_steps())
    }

    /// Converter with a custom chain. Steps are sorted by threshold.
    pub fn with_steps(
        current: &str,
        mut steps: Vec<Box<dyn MigrationStep>>,
    ) -> Result<Self, ConversionError> {
        steps.sort_by_key(|step| step.threshold());
        Ok(Self {
            steps,
            current: current.parse()?,
        })
    }

    #[must_use]
    pub fn current_version(&self) -> &CodeVersion {
        &self.current
    }

    /// Migrate a serialized tree from `code_version`. Does not stamp anything.
    pub fn convert_config(
        &self,
        config: &mut Value,
        code_version: Option<&str>,
    ) -> Result<ConversionReport, ConversionError> {
        if !config.is_object() {
            return Err(ConversionError::NotAnObject);
        }
        let from = parse_optional(code_version)?;
        let pending: Vec<&dyn MigrationStep> = self
            .steps
            .iter()
            .map(|step| step.as_ref())
            .filter(|step| from.as_ref().map_or(true, |from| step.threshold() > *from))
            .collect();

        let mut report = ConversionReport {
            from: code_version.map(str::to_string),
            to: self.current.to_string(),
            applied_steps: pending.iter().map(|step| step.name()).collect(),
            ..ConversionReport::default()
        };

        if !pending.is_empty() {
            Self::walk(config, &pending, NodeContext::root(), &mut report);
        }
        Ok(report)
    }

    fn walk(
        node: &mut Value,
        steps: &[&dyn MigrationStep],
        ctx: NodeContext,
        report: &mut ConversionReport,
    ) {
        let Some(block) = node.as_object_mut() else {
            return;
        };
        report.blocks_visited += 1;

        let mut changed = false;
        for step in steps {
            changed |= step.apply(block, &ctx);
        }
        if changed {
            report.blocks_changed += 1;
        }

        let parent_tag = str_field(block, "tag");
        let parent_type = str_field(block, "blockType");
        let Some(children) = block.get_mut("children").and_then(Value::as_array_mut) else {
            return;
        };
        let sibling_tags: Vec<Option<String>> = children
            .iter()
            .map(|child| child.get("tag").and_then(Value::as_str).map(str::to_string))
            .collect();
        for (index, child) in children.iter_mut().enumerate() {
            let ctx = NodeContext::child_of_parts(
                parent_tag.clone(),
                parent_type.clone(),
                index,
                &sibling_tags,
            );
            Self::walk(child, steps, ctx, report);
        }
    }
}

impl PolicyMigration for PolicyConverter {
    fn convert_policy(&self, policy: &mut Policy) -> Result<ConversionReport, ConversionError> {
        let current = self.current.to_string();
        if policy.code_version.as_deref() == Some(current.as_str()) {
            debug!(policy_id = %policy.id, "[pe-01] policy already at engine version");
            return Ok(ConversionReport {
                from: Some(current.clone()),
                to: current,
                ..ConversionReport::default()
            });
        }

        let report = match policy.config.as_mut() {
            Some(config) => self.convert_config(config, policy.code_version.as_deref())?,
            None => ConversionReport {
                from: policy.code_version.clone(),
                to: current.clone(),
                ..ConversionReport::default()
            },
        };
        policy.code_version = Some(current);

        info!(
            policy_id = %policy.id,
            from = ?report.from,
            to = %report.to,
            steps = report.applied_steps.len(),
            blocks_changed = report.blocks_changed,
            "[pe-01] policy configuration migrated"
        );
        Ok(report)
    }

    fn needs_migration(&self, code_version: Option<&str>) -> bool {
        match parse_optional(code_version) {
            Ok(Some(version)) => version < self.current,
            Ok(None) | Err(_) => true,
        }
    }
}

fn parse_optional(version: Option<&str>) -> Result<Option<CodeVersion>, ConversionError> {
    version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::parse)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_config() -> Value {
        json!({
            "blockType": "interfaceContainerBlock",
            "tag": "root",
            "children": [
                {
                    "blockType": "requestVcDocument",
                    "tag": "request"
                },
                {
                    "blockType": "interfaceDocumentsSource",
                    "tag": "grid",
                    "dependencies": ["request"]
                },
                {
                    "blockType": "interfaceAction",
                    "tag": "choose",
                    "type": "selector",
                    "field": "option.status",
                    "uiMetaData": {"options": [
                        {"name": "Approve", "value": "APPROVED", "bindBlock": "mint", "user": "CURRENT"}
                    ]}
                },
                {
                    "blockType": "mintDocument",
                    "tag": "mint"
                }
            ]
        })
    }

    #[test]
    fn test_full_chain_from_scratch() {
        let converter = PolicyConverter::new().unwrap();
        let mut config = legacy_config();
        let report = converter.convert_config(&mut config, None).unwrap();

        assert_eq!(report.applied_steps.len(), 4);
        assert_eq!(report.blocks_visited, 5);
        assert_eq!(config["children"][0]["blockType"], json!("requestVcDocumentBlock"));
        assert_eq!(config["children"][1]["events"][0]["source"], json!("request"));
        assert_eq!(config["children"][2]["blockType"], json!("buttonBlock"));
        assert_eq!(config["children"][2]["events"][0]["output"], json!("Option_0"));
        assert_eq!(config["children"][3]["accountType"], json!("default"));
    }

    #[test]
    fn test_chain_is_idempotent() {
        let converter = PolicyConverter::new().unwrap();
        let mut once = legacy_config();
        converter.convert_config(&mut once, None).unwrap();

        let mut twice = once.clone();
        let report = converter.convert_config(&mut twice, None).unwrap();

        assert_eq!(once, twice);
        assert_eq!(report.blocks_changed, 0);
    }

    #[test]
    fn test_only_newer_steps_run() {
        let converter = PolicyConverter::new().unwrap();
        let mut config = json!({"blockType": "mintDocument", "tag": "mint"});
        let report = converter.convert_config(&mut config, Some("1.2.0")).unwrap();

        assert_eq!(report.applied_steps, vec!["default-account-type"]);
        // Rename is below the policy's version and is skipped.
        assert_eq!(config["blockType"], json!("mintDocument"));
    }

    #[test]
    fn test_convert_policy_stamps_version() {
        let converter = PolicyConverter::new().unwrap();
        let mut policy = Policy::draft("p1", "did:owner", "Demo");
        policy.config = Some(legacy_config());

        assert!(converter.needs_migration(policy.code_version.as_deref()));
        converter.convert_policy(&mut policy).unwrap();
        assert_eq!(policy.code_version.as_deref(), Some(ENGINE_CODE_VERSION));
        assert!(!converter.needs_migration(policy.code_version.as_deref()));

        let report = converter.convert_policy(&mut policy).unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn test_rejects_non_object_root() {
        let converter = PolicyConverter::new().unwrap();
        let mut config = json!([1, 2, 3]);
        assert_eq!(
            converter.convert_config(&mut config, None),
            Err(ConversionError::NotAnObject)
        );
        assert!(converter.convert_config(&mut json!({}), Some("one")).is_err());
    }
}
