//! Buttons: each configured button tag is an output of the block.

use super::{base_data, BlockContext};
use crate::domain::errors::EngineError;
use crate::domain::event::EventActors;
use crate::domain::options::ButtonOptions;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_bus::ExternalEventType;
use shared_types::entities::{DocumentPayload, PolicyUser};

#[derive(Debug, Deserialize)]
struct ButtonPress {
    tag: String,
    #[serde(default)]
    document: Option<DocumentPayload>,
}

pub(super) fn get_data(ctx: &BlockContext<'_>) -> Value {
    let mut data = base_data(ctx);
    data.insert(
        "user".into(),
        ctx.node().options.get("user").cloned().unwrap_or(Value::Null),
    );
    Value::Object(data)
}

pub(super) async fn set_data(
    ctx: &BlockContext<'_>,
    opts: &ButtonOptions,
    user: &PolicyUser,
    data: Value,
) -> Result<Value, EngineError> {
    let press: ButtonPress =
        serde_json::from_value(data).map_err(|e| ctx.action_error(format!("Invalid data: {e}")))?;
    if !opts.tags().contains(&press.tag.as_str()) {
        return Err(ctx.action_error(format!("Unknown button: {}", press.tag)));
    }

    let actors = EventActors::started_by(user.clone());
    ctx.trigger(&press.tag, &actors, press.document).await?;
    ctx.external(ExternalEventType::Set, Some(user), json!({ "button": press.tag }))
        .await;
    Ok(json!({}))
}
