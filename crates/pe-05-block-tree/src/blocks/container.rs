//! Interface containers and steps.

use super::{base_data, BlockContext};
use crate::domain::kind::BlockKind;
use crate::domain::options::StepOptions;
use crate::domain::permissions::is_allowed;
use crate::domain::tree::BlockNode;
use crate::registry::{PolicyInstance, STEP_INDEX_FIELD};
use pe_04_user_state::UserStateApi;
use serde_json::{json, Value};
use shared_bus::ExternalEventType;
use shared_types::entities::{BlockId, PolicyUser};
use tracing::debug;

fn summary(node: &BlockNode) -> Value {
    json!({
        "id": node.id,
        "blockType": node.block_type(),
        "tag": node.tag,
    })
}

/// Children `user` may see.
fn visible_children(ctx: &BlockContext<'_>, user: &PolicyUser) -> Vec<Value> {
    let tree = &ctx.instance.tree;
    ctx.node()
        .children
        .iter()
        .map(|&child| tree.node(child))
        .filter(|child| is_allowed(&child.permissions, user))
        .map(summary)
        .collect()
}

pub(super) fn get_data(ctx: &BlockContext<'_>, user: &PolicyUser) -> Value {
    let mut data = base_data(ctx);
    data.insert("blocks".into(), Value::Array(visible_children(ctx, user)));
    Value::Object(data)
}

fn step_index(ctx: &BlockContext<'_>, user: &PolicyUser) -> usize {
    ctx.state(user)
        .get(STEP_INDEX_FIELD)
        .and_then(Value::as_u64)
        .map_or(0, |i| i as usize)
}

pub(super) fn get_step_data(ctx: &BlockContext<'_>, user: &PolicyUser) -> Value {
    let tree = &ctx.instance.tree;
    let index = step_index(ctx, user);
    let active = ctx
        .node()
        .children
        .get(index)
        .map(|&child| tree.node(child))
        .filter(|child| is_allowed(&child.permissions, user))
        .map_or(Value::Null, summary);

    let mut data = base_data(ctx);
    data.insert("index".into(), json!(index));
    data.insert("blocks".into(), Value::Array(visible_children(ctx, user)));
    data.insert("active".into(), active);
    Value::Object(data)
}

/// `RunEvent` on the step itself: next child, or back to the first one for
/// cyclic steps.
pub(super) async fn advance_step(ctx: &BlockContext<'_>, opts: &StepOptions, user: &PolicyUser) {
    let count = ctx.node().children.len();
    let current = step_index(ctx, user);
    let next = if opts.cyclic {
        0
    } else {
        (current + 1).min(count.saturating_sub(1))
    };
    set_step(ctx.instance, &ctx.node().id, user, next);
    ctx.block_updated(user).await;
    ctx.external(ExternalEventType::StepChanged, Some(user), json!({ "index": next }))
        .await;
}

fn set_step(instance: &PolicyInstance, block_id: &BlockId, user: &PolicyUser, index: usize) {
    if let Err(e) = instance
        .state
        .set(block_id, user.id(), json!({ STEP_INDEX_FIELD: index }))
    {
        debug!("[pe-05] step state not updated: {e}");
    }
}

/// A child of a step received `RunEvent`: make it the visible one.
pub(crate) async fn enter_step(ctx: &BlockContext<'_>, user: &PolicyUser) {
    let tree = &ctx.instance.tree;
    let Some(parent) = ctx.node().parent else {
        return;
    };
    let step = tree.node(parent);
    if step.kind != BlockKind::InterfaceStep {
        return;
    }
    let Some(position) = tree.child_position(ctx.index) else {
        return;
    };
    set_step(ctx.instance, &step.id, user, position);

    let step_ctx = BlockContext {
        engine: ctx.engine,
        instance: ctx.instance,
        index: parent,
    };
    step_ctx.block_updated(user).await;
    step_ctx
        .external(ExternalEventType::StepChanged, Some(user), json!({ "index": position }))
        .await;
}
