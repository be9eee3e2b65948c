//! Entry point for documents pushed by external providers.

use super::BlockContext;
use crate::domain::errors::EngineError;
use crate::domain::event::EventActors;
use crate::domain::options::ExternalDataOptions;
use serde_json::json;
use shared_bus::ExternalEventType;
use shared_types::entities::{DocumentPayload, PolicyDocument};
use shared_types::ipc::ExternalDataPayload;

pub(super) async fn receive(
    ctx: &BlockContext<'_>,
    opts: &ExternalDataOptions,
    payload: &ExternalDataPayload,
) -> Result<(), EngineError> {
    if !ctx.services().credentials.verify(&payload.document).await? {
        return Err(ctx.action_error("Invalid document"));
    }

    let mut document = PolicyDocument::new(
        ctx.policy_id(),
        payload.owner.clone(),
        payload.document.clone(),
    )
    .with_tag(ctx.node().tag.clone());

    if let Some(iri) = &opts.schema {
        let schema = ctx.schema(iri).await?;
        let subjects = document.credential_subjects();
        let subject = subjects.first().and_then(|s| s.as_object());
        for field in schema.required_fields() {
            if !subject.is_some_and(|s| s.contains_key(field)) {
                return Err(ctx.action_error(format!("Field {field} is required")));
            }
        }
        document.schema = Some(iri.clone());
    }

    let user = ctx.instance.resolve_user(&payload.owner, None);
    ctx.external(
        ExternalEventType::Run,
        Some(&user),
        json!({ "documentId": document.id, "owner": payload.owner }),
    )
    .await;
    ctx.emit_result(
        &EventActors::started_by(user),
        DocumentPayload::single(document),
    )
    .await
}
