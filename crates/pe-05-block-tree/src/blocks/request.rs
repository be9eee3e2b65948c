//! Credential request form.
//!
//! Submitting is guarded by the per-user `active` flag: the block goes
//! inactive while the credential is issued and validated, and becomes active
//! again once the result has been routed. On failure the router restores it.

use super::{base_data, validator, BlockContext};
use crate::domain::errors::EngineError;
use crate::domain::event::{EventActors, PolicyEvent};
use crate::domain::kind::BlockKind;
use crate::domain::options::{Behavior, IdType, RequestOptions};
use pe_04_user_state::UserStateApi;
use serde_json::{json, Map, Value};
use shared_bus::ExternalEventType;
use shared_types::entities::{DocumentPayload, PolicyDocument, PolicyUser};
use tracing::debug;
use uuid::Uuid;

pub(super) async fn get_data(
    ctx: &BlockContext<'_>,
    opts: &RequestOptions,
    user: &PolicyUser,
) -> Result<Value, EngineError> {
    let schema = match &opts.schema {
        Some(iri) => Some(ctx.schema(iri).await?),
        None => None,
    };
    let state = ctx.state(user);

    let mut data = base_data(ctx);
    data.insert("schema".into(), json!(schema));
    data.insert("presetSchema".into(), json!(opts.preset_schema));
    data.insert("hideFields".into(), json!(opts.hide_fields));
    data.insert("active".into(), json!(state.is_active()));
    data.insert(
        "restoreData".into(),
        state.to_value().get("restoreData").cloned().unwrap_or(Value::Null),
    );
    Ok(Value::Object(data))
}

pub(super) async fn set_data(
    ctx: &BlockContext<'_>,
    opts: &RequestOptions,
    user: &PolicyUser,
    data: Value,
) -> Result<Value, EngineError> {
    if !ctx.state(user).is_active() {
        return Err(ctx.action_error("Block not available"));
    }
    ctx.set_state(user, json!({ "active": false }))?;

    let account = ctx
        .services()
        .accounts
        .ledger_account(&user.did)
        .await?
        .ok_or_else(|| ctx.action_error("User has no ledger account"))?;

    let mut subject = match data.get("document") {
        Some(Value::Object(document)) => document.clone(),
        _ => return Err(ctx.action_error("Invalid document")),
    };

    let iri = opts
        .schema
        .as_deref()
        .ok_or_else(|| ctx.action_error("Schema is not set"))?;
    let schema = ctx.schema(iri).await?;
    for field in schema.required_fields() {
        if !subject.contains_key(field) {
            return Err(ctx.action_error(format!("Field {field} is required")));
        }
    }
    for preset in opts.preset_fields.iter().filter(|p| p.readonly) {
        if let Some(value) = &preset.value {
            subject.insert(preset.name.clone(), json!(value));
        }
    }

    match opts.id_type {
        IdType::Uuid => {
            subject.insert("id".into(), json!(format!("urn:uuid:{}", Uuid::new_v4())));
        }
        IdType::Owner => {
            subject.insert("id".into(), json!(user.did));
        }
        IdType::None => {}
    }
    subject.insert("policyId".into(), json!(ctx.policy_id()));
    let reference = data.get("ref").and_then(Value::as_str).map(str::to_string);
    if let Some(reference) = &reference {
        subject.insert("ref".into(), json!(reference));
    }

    let credential = ctx
        .services()
        .credentials
        .issue(&user.did, &account, Value::Object(subject))
        .await?;
    let mut document = PolicyDocument::new(ctx.policy_id(), user.did.clone(), credential)
        .with_schema(iri)
        .with_tag(ctx.node().tag.clone());
    document.relationships.extend(reference);

    run_validators(ctx, &document)?;
    ctx.set_active(user, true);

    let actors = EventActors::started_by(user.clone());
    ctx.emit_result(&actors, DocumentPayload::single(document.clone()))
        .await?;
    ctx.external(
        ExternalEventType::Set,
        Some(user),
        json!({ "documentId": document.id }),
    )
    .await;
    Ok(json!({ "documentId": document.id }))
}

/// Validator children must all accept the new document.
fn run_validators(ctx: &BlockContext<'_>, document: &PolicyDocument) -> Result<(), EngineError> {
    let tree = &ctx.instance.tree;
    for &child in &ctx.node().children {
        let node = tree.node(child);
        if node.kind != BlockKind::DocumentValidator {
            continue;
        }
        if let Behavior::DocumentValidator(opts) = &node.behavior {
            if let Some(message) = validator::check(opts, document) {
                return Err(ctx.action_error(message));
            }
        }
    }
    Ok(())
}

pub(super) fn restore(ctx: &BlockContext<'_>, event: &PolicyEvent) {
    let Some(document) = event.data.as_ref().and_then(DocumentPayload::first) else {
        debug!(block = %ctx.node().tag, "[pe-05] restore without document");
        return;
    };
    let subject = document
        .credential_subjects()
        .first()
        .map_or_else(|| Value::Object(Map::new()), |s| (*s).clone());
    ctx.instance
        .state
        .stash_restore(&ctx.node().id, event.user().id(), subject);
}
