//! Persist documents, applying configured option updates.

use super::BlockContext;
use crate::domain::errors::EngineError;
use crate::domain::event::PolicyEvent;
use crate::domain::options::SendOptions;
use serde_json::json;
use shared_bus::ExternalEventType;
use shared_types::entities::{DocumentPayload, PolicyDocument};

pub(super) async fn run(
    ctx: &BlockContext<'_>,
    opts: &SendOptions,
    event: PolicyEvent,
) -> Result<(), EngineError> {
    let data = event
        .data
        .as_ref()
        .ok_or_else(|| ctx.action_error("Invalid document"))?;

    let mut saved = Vec::new();
    for document in data.documents() {
        let mut document = document.clone();
        for update in &opts.options {
            document.option.insert(update.name.clone(), update.value.clone());
        }
        if let Some(entity_type) = &opts.entity_type {
            document.option.insert("entityType".into(), json!(entity_type));
        }
        document.tag = Some(ctx.node().tag.clone());
        saved.push(ctx.services().documents.save(document).await?);
    }

    let ids: Vec<&str> = saved.iter().map(|d: &PolicyDocument| d.id.as_str()).collect();
    ctx.external(
        ExternalEventType::DocumentSaved,
        Some(event.user()),
        json!({ "documents": ids }),
    )
    .await;

    let payload = match data {
        DocumentPayload::Single(_) if saved.len() == 1 => {
            DocumentPayload::single(saved.remove(0))
        }
        _ => DocumentPayload::Many(saved),
    };
    ctx.emit_result(&event.actors, payload).await
}
