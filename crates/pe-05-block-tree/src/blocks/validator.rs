//! Document validation against field conditions.

use super::{document_scope, BlockContext};
use crate::domain::errors::EngineError;
use crate::domain::event::PolicyEvent;
use crate::domain::formula::lookup;
use crate::domain::options::{ConditionType, ValidatorCondition, ValidatorOptions};
use serde_json::Value;
use shared_types::entities::PolicyDocument;

fn holds(condition: &ValidatorCondition, actual: &Value) -> bool {
    let listed = || match &condition.value {
        Value::Array(items) => items.contains(actual),
        other => other == actual,
    };
    match condition.condition {
        ConditionType::Equal => actual == &condition.value,
        ConditionType::NotEqual => actual != &condition.value,
        ConditionType::In => listed(),
        ConditionType::NotIn => !listed(),
    }
}

/// First failed condition as a user-facing message, if any.
///
/// Field paths are resolved against the stored document, so both
/// `option.status` and `document.credentialSubject.0.amount` work.
#[must_use]
pub fn check(opts: &ValidatorOptions, document: &PolicyDocument) -> Option<String> {
    let scope = document_scope(document);
    opts.conditions.iter().find_map(|condition| {
        let actual = lookup(&scope, &condition.field).unwrap_or(&Value::Null);
        (!holds(condition, actual)).then(|| format!("Invalid document: {}", condition.field))
    })
}

pub(super) async fn run(
    ctx: &BlockContext<'_>,
    opts: &ValidatorOptions,
    event: PolicyEvent,
) -> Result<(), EngineError> {
    let data = event
        .data
        .ok_or_else(|| ctx.action_error("Invalid document"))?;
    for document in data.documents() {
        if let Some(message) = check(opts, document) {
            return Err(ctx.action_error(message));
        }
    }
    ctx.emit_result(&event.actors, data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(conditions: Value) -> ValidatorOptions {
        serde_json::from_value(json!({ "conditions": conditions })).unwrap()
    }

    fn document() -> PolicyDocument {
        let mut doc = PolicyDocument::new(
            "p1",
            "did:alice",
            json!({"credentialSubject": [{"capacity": 12, "kind": "solar"}]}),
        );
        doc.option.insert("status".into(), json!("approved"));
        doc
    }

    #[test]
    fn test_equal_and_in() {
        let opts = options(json!([
            {"field": "option.status", "type": "equal", "value": "approved"},
            {"field": "document.credentialSubject.0.kind", "type": "in", "value": ["solar", "wind"]}
        ]));
        assert_eq!(check(&opts, &document()), None);
    }

    #[test]
    fn test_first_failure_reported() {
        let opts = options(json!([
            {"field": "option.status", "type": "not_equal", "value": "approved"},
            {"field": "document.credentialSubject.0.kind", "type": "not_in", "value": ["solar"]}
        ]));
        assert_eq!(
            check(&opts, &document()).as_deref(),
            Some("Invalid document: option.status")
        );
    }

    #[test]
    fn test_missing_field_is_null() {
        let opts = options(json!([{"field": "option.missing", "type": "equal", "value": null}]));
        assert_eq!(check(&opts, &document()), None);
    }
}
