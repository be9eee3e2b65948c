//! Outbound HTTP calls executed by the worker pool.
//!
//! `${path}` placeholders in the url, headers and body are filled from
//! `{did, username, document | documents}`. The response must be a
//! verifiable credential; it becomes the block's output document.

use super::BlockContext;
use crate::domain::errors::EngineError;
use crate::domain::event::PolicyEvent;
use crate::domain::formula::lookup;
use crate::domain::options::HttpOptions;
use pe_02_task_dispatcher::TaskRequest;
use serde_json::{json, Map, Value};
use shared_bus::ExternalEventType;
use shared_types::entities::output_events::ERROR_EVENT;
use shared_types::entities::{DocumentPayload, PolicyDocument};
use shared_types::ipc::WorkerTaskType;

/// Priority of HTTP tasks in the worker pool.
const HTTP_PRIORITY: u8 = 10;

/// Replace every `${path}` in `template` with the value at `path`.
/// Unknown paths become empty strings; strings are inserted unquoted.
#[must_use]
pub fn replace_variables(template: &str, variables: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let path = rest[start + 2..start + 2 + len].trim();
        match lookup(variables, path) {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &rest[start + 3 + len..];
    }
    out.push_str(rest);
    out
}

fn variables(event: &PolicyEvent) -> Map<String, Value> {
    let user = event.user();
    let mut vars = Map::new();
    vars.insert("did".into(), json!(user.did));
    vars.insert("username".into(), json!(user.username));
    match &event.data {
        Some(DocumentPayload::Single(document)) => {
            vars.insert("document".into(), document.document.clone());
        }
        Some(DocumentPayload::Many(documents)) => {
            let bodies: Vec<Value> = documents.iter().map(|d| d.document.clone()).collect();
            vars.insert("documents".into(), Value::Array(bodies));
        }
        None => {}
    }
    vars
}

fn request_body(event: &PolicyEvent) -> Value {
    match &event.data {
        Some(DocumentPayload::Single(document)) => json!({ "document": document.document }),
        Some(DocumentPayload::Many(documents)) => {
            let bodies: Vec<&Value> = documents.iter().map(|d| &d.document).collect();
            json!({ "documents": bodies })
        }
        None => json!({}),
    }
}

async fn call(
    ctx: &BlockContext<'_>,
    opts: &HttpOptions,
    event: &PolicyEvent,
) -> Result<PolicyDocument, EngineError> {
    let vars = variables(event);
    let url = replace_variables(&opts.url, &vars);
    let headers: Map<String, Value> = opts
        .headers
        .iter()
        .map(|h| (h.name.clone(), json!(replace_variables(&h.value, &vars))))
        .collect();
    let body_text = replace_variables(&request_body(event).to_string(), &vars);
    let body: Value = serde_json::from_str(&body_text)
        .map_err(|e| ctx.action_error(format!("Invalid request body: {e}")))?;

    let data = json!({
        "payload": {
            "method": opts.method.to_uppercase(),
            "url": url,
            "headers": headers,
            "body": body,
        }
    });
    let response = ctx
        .services()
        .tasks
        .submit(TaskRequest::single_attempt(
            WorkerTaskType::HttpRequest,
            data,
            HTTP_PRIORITY,
        ))
        .await
        .map_err(|e| ctx.action_error(e.to_string()))?;

    if response.is_null() {
        return Err(ctx.action_error("Invalid response"));
    }
    if !ctx.services().credentials.verify(&response).await? {
        return Err(ctx.action_error("Received data is not VC"));
    }
    Ok(PolicyDocument::new(ctx.policy_id(), event.user().did.clone(), response)
        .with_tag(ctx.node().tag.clone()))
}

pub(super) async fn run(
    ctx: &BlockContext<'_>,
    opts: &HttpOptions,
    event: PolicyEvent,
) -> Result<(), EngineError> {
    match call(ctx, opts, &event).await {
        Ok(document) => {
            ctx.external(
                ExternalEventType::Http,
                Some(event.user()),
                json!({ "url": opts.url, "documentId": document.id }),
            )
            .await;
            ctx.emit_result(&event.actors, DocumentPayload::single(document))
                .await
        }
        Err(err) => {
            ctx.trigger(ERROR_EVENT, &event.actors, None).await?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_variables() {
        let vars = json!({
            "did": "did:alice",
            "document": {"credentialSubject": [{"amount": 5}]}
        });
        let vars = vars.as_object().unwrap();
        assert_eq!(
            replace_variables("https://x.org/${did}/${document.credentialSubject.0.amount}", vars),
            "https://x.org/did:alice/5"
        );
        assert_eq!(replace_variables("a${missing}b", vars), "ab");
        assert_eq!(replace_variables("open ${did", vars), "open ${did");
    }
}
