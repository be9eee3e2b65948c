//! Conditional routing: each condition's tag is an output.

use super::{subject_scope, BlockContext};
use crate::domain::errors::EngineError;
use crate::domain::event::{EventActors, PolicyEvent};
use crate::domain::options::{ExecutionFlow, SwitchActor, SwitchConditionType, SwitchOptions};
use serde_json::Map;
use shared_types::entities::DocumentPayload;
use tracing::{debug, warn};

pub(super) async fn run(
    ctx: &BlockContext<'_>,
    opts: &SwitchOptions,
    event: PolicyEvent,
) -> Result<(), EngineError> {
    let first = event.data.as_ref().and_then(DocumentPayload::first);
    let scope = first.map(subject_scope).unwrap_or_else(Map::new);

    for (position, condition) in opts.conditions.iter().enumerate() {
        let matched = match (condition.condition, opts.formulas.get(position)) {
            (SwitchConditionType::Unconditional, _) => true,
            (kind, Some(Some(formula))) => match formula.evaluate_bool(&scope) {
                Ok(value) => (kind == SwitchConditionType::Equal) == value,
                Err(e) => {
                    warn!(
                        block = %ctx.node().tag,
                        tag = %condition.tag,
                        "[pe-05] switch condition failed: {e}"
                    );
                    false
                }
            },
            _ => false,
        };
        debug!(block = %ctx.node().tag, tag = %condition.tag, matched, "[pe-05] switch condition");
        if !matched {
            continue;
        }

        let actors = match condition.actor {
            SwitchActor::Current => event.actors.clone(),
            SwitchActor::Owner => EventActors {
                user: ctx.instance.owner_user(),
                initiator: event.actors.initiator.clone(),
            },
            SwitchActor::Issuer => match first {
                Some(document) => EventActors {
                    user: ctx.instance.resolve_user(&document.owner, None),
                    initiator: event.actors.initiator.clone(),
                },
                None => event.actors.clone(),
            },
        };
        ctx.trigger(&condition.tag, &actors, event.data.clone()).await?;

        if opts.execution_flow == ExecutionFlow::FirstTrue {
            break;
        }
    }
    Ok(())
}
