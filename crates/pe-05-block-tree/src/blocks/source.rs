//! Document grids.

use super::{base_data, document_scope, BlockContext};
use crate::domain::errors::EngineError;
use crate::domain::formula::lookup;
use crate::domain::options::{FieldFilter, SourceOptions};
use crate::ports::outbound::DocumentQuery;
use serde_json::Value;
use shared_types::entities::{PolicyDocument, PolicyUser};

fn passes(document: &PolicyDocument, filters: &[FieldFilter]) -> bool {
    if filters.is_empty() {
        return true;
    }
    let scope = document_scope(document);
    filters
        .iter()
        .all(|filter| lookup(&scope, &filter.field) == Some(&filter.value))
}

pub(super) async fn get_data(
    ctx: &BlockContext<'_>,
    opts: &SourceOptions,
    user: &PolicyUser,
) -> Result<Value, EngineError> {
    let query = DocumentQuery {
        policy_id: ctx.policy_id().to_string(),
        schema: opts.schema.clone(),
        owner: opts.only_own_documents.then(|| user.did.clone()),
        tag: None,
    };
    let documents: Vec<PolicyDocument> = ctx
        .services()
        .documents
        .find(&query)
        .await?
        .into_iter()
        .filter(|document| passes(document, &opts.filters))
        .collect();

    let mut data = base_data(ctx);
    data.insert(
        "data".into(),
        serde_json::to_value(&documents).unwrap_or(Value::Array(Vec::new())),
    );
    Ok(Value::Object(data))
}
