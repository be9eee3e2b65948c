//! Calculate container with math addon children.

use super::{subject_scope, BlockContext};
use crate::domain::errors::EngineError;
use crate::domain::event::PolicyEvent;
use crate::domain::formula::lookup;
use crate::domain::options::{Behavior, CalculateOptions};
use serde_json::{json, Map, Value};
use shared_bus::ExternalEventType;
use shared_types::entities::{DocumentPayload, PolicyDocument};

/// Input fields mapped to variables, then every addon equation in order.
fn evaluate_scope(
    ctx: &BlockContext<'_>,
    opts: &CalculateOptions,
    subject: &Map<String, Value>,
) -> Result<Map<String, Value>, EngineError> {
    let mut scope = Map::new();
    for mapping in &opts.input_fields {
        let value = lookup(subject, &mapping.name).cloned().unwrap_or(Value::Null);
        scope.insert(mapping.value.clone(), value);
    }

    let tree = &ctx.instance.tree;
    for &child in &ctx.node().children {
        if let Behavior::CalculateMathAddon(math) = &tree.node(child).behavior {
            for (variable, formula) in &math.compiled {
                let value = formula
                    .evaluate(&scope)
                    .map_err(|e| ctx.action_error(format!("{variable}: {e}")))?;
                scope.insert(variable.clone(), value);
            }
        }
    }
    Ok(scope)
}

pub(super) async fn run(
    ctx: &BlockContext<'_>,
    opts: &CalculateOptions,
    event: PolicyEvent,
) -> Result<(), EngineError> {
    let input = event
        .data
        .as_ref()
        .and_then(DocumentPayload::first)
        .ok_or_else(|| ctx.action_error("Invalid document"))?;
    let scope = evaluate_scope(ctx, opts, &subject_scope(input))?;

    let mut subject = Map::new();
    for mapping in &opts.output_fields {
        let value = scope.get(&mapping.value).cloned().unwrap_or(Value::Null);
        subject.insert(mapping.name.clone(), value);
    }
    subject.insert("policyId".into(), json!(ctx.policy_id()));
    subject.insert("ref".into(), json!(input.id));

    let account = ctx
        .services()
        .accounts
        .ledger_account(&ctx.instance.owner)
        .await?
        .ok_or_else(|| ctx.action_error("Policy owner has no ledger account"))?;
    let credential = ctx
        .services()
        .credentials
        .issue(&ctx.instance.owner, &account, Value::Object(subject))
        .await?;

    let mut document = PolicyDocument::new(ctx.policy_id(), input.owner.clone(), credential)
        .with_tag(ctx.node().tag.clone());
    document.schema = opts.output_schema.clone();
    document.relationships.push(input.id.clone());

    ctx.external(
        ExternalEventType::Run,
        Some(event.user()),
        json!({ "documentId": document.id }),
    )
    .await;
    ctx.emit_result(&event.actors, DocumentPayload::single(document))
        .await
}
