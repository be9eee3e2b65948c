//! Built-in migration steps.
//!
//! A step receives one block object and its [`NodeContext`]. It must leave
//! blocks that already have the target shape untouched.

use super::context::{str_field, NodeContext};
use super::version::CodeVersion;
use serde_json::{json, Map, Value};
use shared_types::entities::{output_events, EventActor, EventConfig, InputEventType};
use tracing::debug;

/// One threshold of the migration chain.
pub trait MigrationStep: Send + Sync {
    /// Policies with a `codeVersion` below this threshold need the step.
    fn threshold(&self) -> CodeVersion;

    fn name(&self) -> &'static str;

    /// Migrate one block in place. Returns `true` if anything changed.
    fn apply(&self, block: &mut Map<String, Value>, ctx: &NodeContext) -> bool;
}

/// The full chain in ascending threshold order.
#[must_use]
pub fn default_steps() -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(RenameLegacyBlockTypes),
        Box::new(ExplicitEvents),
        Box::new(SelectorToButtons),
        Box::new(DefaultAccountType),
    ]
}

// =============================================================================
// 1.0.0
// =============================================================================

/// Legacy block type names.
pub struct RenameLegacyBlockTypes;

const LEGACY_BLOCK_TYPES: [(&str, &str); 7] = [
    ("interfaceDocumentsSource", "interfaceDocumentsSourceBlock"),
    ("requestVcDocument", "requestVcDocumentBlock"),
    ("sendToGuardian", "sendToGuardianBlock"),
    ("interfaceAction", "interfaceActionBlock"),
    ("mintDocument", "mintDocumentBlock"),
    ("aggregateDocument", "aggregateDocumentBlock"),
    ("wipeDocument", "retirementDocumentBlock"),
];

impl MigrationStep for RenameLegacyBlockTypes {
    fn threshold(&self) -> CodeVersion {
        CodeVersion::new(1, 0, 0)
    }

    fn name(&self) -> &'static str {
        "rename-legacy-block-types"
    }

    fn apply(&self, block: &mut Map<String, Value>, _ctx: &NodeContext) -> bool {
        let Some(current) = str_field(block, "blockType") else {
            return false;
        };
        let Some((_, renamed)) = LEGACY_BLOCK_TYPES
            .iter()
            .find(|(legacy, _)| *legacy == current)
        else {
            return false;
        };
        block.insert("blockType".into(), Value::String((*renamed).to_string()));
        true
    }
}

// =============================================================================
// 1.1.0
// =============================================================================

/// Implicit wiring (`dependencies`, selector options, switch conditions,
/// aggregate timers) becomes explicit event edges.
pub struct ExplicitEvents;

impl ExplicitEvents {
    fn push_edge(events: &mut Vec<Value>, edge: EventConfig) -> bool {
        let Ok(value) = serde_json::to_value(&edge) else {
            return false;
        };
        let duplicate = events.iter().any(|existing| {
            serde_json::from_value::<EventConfig>(existing.clone())
                .map(|existing| existing == edge)
                .unwrap_or(false)
        });
        if duplicate {
            return false;
        }
        events.push(value);
        true
    }

    fn dependency_edges(block: &Map<String, Value>, tag: &str) -> Vec<EventConfig> {
        block
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|deps| {
                deps.iter()
                    .filter_map(Value::as_str)
                    .map(|dep| {
                        EventConfig::new(
                            dep,
                            tag,
                            output_events::REFRESH_EVENT,
                            InputEventType::RefreshEvent,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tags each entry of `items` (`{prefix}_{i}` when missing) and returns the
    /// `(tag, bindBlock, entry)` triples of entries that bind a target.
    fn tag_entries(items: &mut [Value], prefix: &str) -> (bool, Vec<(String, String, Map<String, Value>)>) {
        let mut changed = false;
        let mut bound = Vec::new();
        for (i, item) in items.iter_mut().enumerate() {
            let Some(entry) = item.as_object_mut() else {
                continue;
            };
            let tag = match str_field(entry, "tag").filter(|t| !t.is_empty()) {
                Some(tag) => tag,
                None => {
                    let tag = format!("{prefix}_{i}");
                    entry.insert("tag".into(), Value::String(tag.clone()));
                    changed = true;
                    tag
                }
            };
            if let Some(target) = str_field(entry, "bindBlock") {
                bound.push((tag, target, entry.clone()));
            }
        }
        (changed, bound)
    }
}

impl MigrationStep for ExplicitEvents {
    fn threshold(&self) -> CodeVersion {
        CodeVersion::new(1, 1, 0)
    }

    fn name(&self) -> &'static str {
        "explicit-events"
    }

    fn apply(&self, block: &mut Map<String, Value>, ctx: &NodeContext) -> bool {
        let tag = str_field(block, "tag").unwrap_or_default();
        let block_type = str_field(block, "blockType").unwrap_or_default();
        let mut changed = false;
        let mut new_edges = Vec::new();

        if !block.contains_key("events") {
            block.insert("events".into(), Value::Array(Vec::new()));
            new_edges.extend(Self::dependency_edges(block, &tag));
            changed = true;
        }

        match block_type.as_str() {
            "interfaceActionBlock" => {
                let action_type = str_field(block, "type").unwrap_or_default();
                if action_type == "selector" {
                    let options = block
                        .get_mut("uiMetaData")
                        .and_then(|ui| ui.get_mut("options"))
                        .and_then(Value::as_array_mut);
                    if let Some(options) = options {
                        let (tagged, bound) = Self::tag_entries(options, "Option");
                        changed |= tagged;
                        for (option_tag, target, option) in bound {
                            let actor = if str_field(&option, "user").as_deref() == Some("CURRENT") {
                                EventActor::EventInitiator
                            } else {
                                EventActor::Owner
                            };
                            new_edges.push(
                                EventConfig::new(&tag, target, option_tag, InputEventType::RunEvent)
                                    .with_actor(actor),
                            );
                        }
                    }
                }
                if action_type == "dropdown" {
                    if let Some(target) = str_field(block, "bindBlock") {
                        new_edges.push(EventConfig::new(
                            &tag,
                            target,
                            output_events::DROPDOWN_EVENT,
                            InputEventType::RunEvent,
                        ));
                    }
                }
            }
            "switchBlock" => {
                if let Some(conditions) = block.get_mut("conditions").and_then(Value::as_array_mut) {
                    let (tagged, bound) = Self::tag_entries(conditions, "Condition");
                    changed |= tagged;
                    for (condition_tag, target, _) in bound {
                        new_edges.push(EventConfig::new(
                            &tag,
                            target,
                            condition_tag,
                            InputEventType::RunEvent,
                        ));
                    }
                }
            }
            "aggregateDocumentBlock" => {
                if let Some(timer) = str_field(block, "timer").filter(|t| !t.is_empty()) {
                    new_edges.push(EventConfig::new(
                        timer,
                        &tag,
                        output_events::TIMER_EVENT,
                        InputEventType::RunEvent,
                    ));
                }
            }
            _ => {}
        }

        if let Some(events) = block.get_mut("events").and_then(Value::as_array_mut) {
            for edge in new_edges {
                if Self::push_edge(events, edge) {
                    changed = true;
                }
            }
        }

        if changed {
            debug!(tag = %tag, index = ?ctx.index, "[pe-01] explicit events added");
        }
        changed
    }
}

// =============================================================================
// 1.2.0
// =============================================================================

/// Selector action blocks become button blocks.
pub struct SelectorToButtons;

impl MigrationStep for SelectorToButtons {
    fn threshold(&self) -> CodeVersion {
        CodeVersion::new(1, 2, 0)
    }

    fn name(&self) -> &'static str {
        "selector-to-buttons"
    }

    fn apply(&self, block: &mut Map<String, Value>, _ctx: &NodeContext) -> bool {
        if str_field(block, "blockType").as_deref() != Some("interfaceActionBlock")
            || str_field(block, "type").as_deref() != Some("selector")
        {
            return false;
        }

        let field = block.get("field").cloned().unwrap_or(Value::Null);
        block.insert("blockType".into(), Value::String("buttonBlock".into()));

        let ui = block
            .entry("uiMetaData")
            .or_insert_with(|| Value::Object(Map::new()));
        if !ui.is_object() {
            *ui = Value::Object(Map::new());
        }
        let Some(ui) = ui.as_object_mut() else {
            return true;
        };

        let options = ui.remove("options");
        let buttons: Vec<Value> = options
            .as_ref()
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .map(|option| {
                        json!({
                            "tag": option.get("tag").cloned().unwrap_or(Value::Null),
                            "name": option.get("name").cloned().unwrap_or(Value::Null),
                            "type": "selector",
                            "filters": [],
                            "field": field.clone(),
                            "value": option.get("value").cloned().unwrap_or(Value::Null),
                            "uiClass": option.get("uiClass").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        ui.insert("buttons".into(), Value::Array(buttons));
        true
    }
}

// =============================================================================
// 1.3.0
// =============================================================================

/// Mint and retirement blocks gained an `accountType` option.
pub struct DefaultAccountType;

impl MigrationStep for DefaultAccountType {
    fn threshold(&self) -> CodeVersion {
        CodeVersion::new(1, 3, 0)
    }

    fn name(&self) -> &'static str {
        "default-account-type"
    }

    fn apply(&self, block: &mut Map<String, Value>, _ctx: &NodeContext) -> bool {
        let applies = matches!(
            str_field(block, "blockType").as_deref(),
            Some("mintDocumentBlock") | Some("retirementDocumentBlock")
        );
        let missing = match block.get("accountType") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if applies && missing {
            block.insert("accountType".into(), Value::String("default".into()));
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rename_legacy() {
        let mut block = object(json!({"blockType": "wipeDocument", "tag": "wipe"}));
        assert!(RenameLegacyBlockTypes.apply(&mut block, &NodeContext::root()));
        assert_eq!(block["blockType"], json!("retirementDocumentBlock"));
        assert!(!RenameLegacyBlockTypes.apply(&mut block, &NodeContext::root()));
    }

    #[test]
    fn test_dependencies_become_refresh_edges() {
        let mut block = object(json!({
            "blockType": "interfaceDocumentsSourceBlock",
            "tag": "grid",
            "dependencies": ["save", "approve"]
        }));
        assert!(ExplicitEvents.apply(&mut block, &NodeContext::root()));
        let events: Vec<EventConfig> = serde_json::from_value(block["events"].clone()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].source, "save");
        assert_eq!(events[0].target, "grid");
        assert_eq!(events[0].input, InputEventType::RefreshEvent);
        assert_eq!(events[0].output, output_events::REFRESH_EVENT);

        // Existing events: dependencies are not re-expanded.
        assert!(!ExplicitEvents.apply(&mut block, &NodeContext::root()));
    }

    #[test]
    fn test_selector_options_tagged_with_actors() {
        let mut block = object(json!({
            "blockType": "interfaceActionBlock",
            "tag": "choose",
            "type": "selector",
            "uiMetaData": {"options": [
                {"name": "Approve", "bindBlock": "approved", "user": "CURRENT"},
                {"name": "Reject", "bindBlock": "rejected", "user": "OWNER", "tag": "reject"}
            ]}
        }));
        ExplicitEvents.apply(&mut block, &NodeContext::root());
        assert_eq!(block["uiMetaData"]["options"][0]["tag"], json!("Option_0"));
        assert_eq!(block["uiMetaData"]["options"][1]["tag"], json!("reject"));

        let events: Vec<EventConfig> = serde_json::from_value(block["events"].clone()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].output, "Option_0");
        assert_eq!(events[0].actor, Some(EventActor::EventInitiator));
        assert_eq!(events[1].actor, Some(EventActor::Owner));
    }

    #[test]
    fn test_switch_conditions_and_timer() {
        let mut switch = object(json!({
            "blockType": "switchBlock",
            "tag": "switch",
            "conditions": [{"bindBlock": "a"}, {"bindBlock": "b"}]
        }));
        ExplicitEvents.apply(&mut switch, &NodeContext::root());
        let events: Vec<EventConfig> = serde_json::from_value(switch["events"].clone()).unwrap();
        assert_eq!(events[1].output, "Condition_1");
        assert_eq!(events[1].target, "b");

        let mut aggregate = object(json!({
            "blockType": "aggregateDocumentBlock",
            "tag": "agg",
            "timer": "timer_block"
        }));
        ExplicitEvents.apply(&mut aggregate, &NodeContext::root());
        let events: Vec<EventConfig> = serde_json::from_value(aggregate["events"].clone()).unwrap();
        assert_eq!(events[0].source, "timer_block");
        assert_eq!(events[0].output, output_events::TIMER_EVENT);
    }

    #[test]
    fn test_selector_to_buttons() {
        let mut block = object(json!({
            "blockType": "interfaceActionBlock",
            "tag": "choose",
            "type": "selector",
            "field": "option.status",
            "uiMetaData": {"options": [
                {"tag": "Option_0", "name": "Approve", "value": "APPROVED", "uiClass": "btn-approve"}
            ]}
        }));
        assert!(SelectorToButtons.apply(&mut block, &NodeContext::root()));
        assert_eq!(block["blockType"], json!("buttonBlock"));
        assert!(block["uiMetaData"].get("options").is_none());
        let button = &block["uiMetaData"]["buttons"][0];
        assert_eq!(button["type"], json!("selector"));
        assert_eq!(button["field"], json!("option.status"));
        assert_eq!(button["value"], json!("APPROVED"));
        assert_eq!(button["filters"], json!([]));
    }

    #[test]
    fn test_default_account_type() {
        let mut mint = object(json!({"blockType": "mintDocumentBlock", "tag": "mint"}));
        assert!(DefaultAccountType.apply(&mut mint, &NodeContext::root()));
        assert_eq!(mint["accountType"], json!("default"));

        let mut custom = object(json!({"blockType": "retirementDocumentBlock", "accountType": "custom"}));
        assert!(!DefaultAccountType.apply(&mut custom, &NodeContext::root()));
        assert_eq!(custom["accountType"], json!("custom"));
    }

    #[test]
    fn test_chain_is_ascending() {
        let steps = default_steps();
        for pair in steps.windows(2) {
            assert!(pair[0].threshold() < pair[1].threshold());
        }
    }
}
