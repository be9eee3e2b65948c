//! Block behaviors.
//!
//! Every kind implements a subset of three operations:
//!
//! | Operation    | Called by                         | Kinds                         |
//! |--------------|-----------------------------------|-------------------------------|
//! | `get_data`   | `GET_BLOCK_DATA`                  | interface and request blocks  |
//! | `set_data`   | `SET_BLOCK_DATA`                  | button, request               |
//! | `run_action` | `RunEvent`/`TimerEvent` on edges  | action and validator blocks   |
//!
//! Anything else answers [`EngineError::Unsupported`].

mod button;
mod calculate;
mod container;
pub mod context;
mod external;
mod http;
mod request;
mod send;
mod source;
mod switch;
mod token;
pub mod validator;

pub use context::BlockContext;

use crate::domain::errors::EngineError;
use crate::domain::event::PolicyEvent;
use crate::domain::options::Behavior;
use serde_json::{json, Map, Value};
use shared_types::entities::{PolicyDocument, PolicyUser};
use shared_types::ipc::ExternalDataPayload;

pub(crate) use container::enter_step;

pub(crate) async fn get_data(ctx: &BlockContext<'_>, user: &PolicyUser) -> Result<Value, EngineError> {
    match &ctx.node().behavior {
        Behavior::InterfaceContainer => Ok(container::get_data(ctx, user)),
        Behavior::InterfaceStep(_) => Ok(container::get_step_data(ctx, user)),
        Behavior::DocumentsSource(opts) => source::get_data(ctx, opts, user).await,
        Behavior::Button(_) => Ok(button::get_data(ctx)),
        Behavior::RequestVcDocument(opts) => request::get_data(ctx, opts, user).await,
        _ => Err(unsupported(ctx, "getData")),
    }
}

pub(crate) async fn set_data(
    ctx: &BlockContext<'_>,
    user: &PolicyUser,
    data: Value,
) -> Result<Value, EngineError> {
    match &ctx.node().behavior {
        Behavior::Button(opts) => button::set_data(ctx, opts, user, data).await,
        Behavior::RequestVcDocument(opts) => request::set_data(ctx, opts, user, data).await,
        _ => Err(unsupported(ctx, "setData")),
    }
}

pub(crate) async fn run_action(ctx: &BlockContext<'_>, event: PolicyEvent) -> Result<(), EngineError> {
    match &ctx.node().behavior {
        Behavior::InterfaceStep(opts) => {
            container::advance_step(ctx, opts, event.user()).await;
            Ok(())
        }
        Behavior::DocumentValidator(opts) => validator::run(ctx, opts, event).await,
        Behavior::HttpRequest(opts) => http::run(ctx, opts, event).await,
        Behavior::SendToGuardian(opts) => send::run(ctx, opts, event).await,
        Behavior::Switch(opts) => switch::run(ctx, opts, event).await,
        Behavior::CalculateContainer(opts) => calculate::run(ctx, opts, event).await,
        Behavior::MintDocument(opts) => token::mint(ctx, opts, event).await,
        Behavior::RetirementDocument(opts) => token::retire(ctx, opts, event).await,
        // Interactive blocks only re-render on run.
        _ => {
            ctx.block_updated(event.user()).await;
            Ok(())
        }
    }
}

/// `RestoreEvent`: show the incoming document back to the user.
pub(crate) fn restore(ctx: &BlockContext<'_>, event: &PolicyEvent) {
    if let Behavior::RequestVcDocument(_) = ctx.node().behavior {
        request::restore(ctx, event);
    }
}

pub(crate) async fn receive_external(
    ctx: &BlockContext<'_>,
    payload: &ExternalDataPayload,
) -> Result<(), EngineError> {
    match &ctx.node().behavior {
        Behavior::ExternalData(opts) => external::receive(ctx, opts, payload).await,
        _ => Err(unsupported(ctx, "receiveData")),
    }
}

fn unsupported(ctx: &BlockContext<'_>, operation: &'static str) -> EngineError {
    EngineError::Unsupported {
        block_type: ctx.node().block_type(),
        operation,
    }
}

/// Common render fields.
fn base_data(ctx: &BlockContext<'_>) -> Map<String, Value> {
    let node = ctx.node();
    let mut data = Map::new();
    data.insert("id".into(), json!(node.id));
    data.insert("blockType".into(), json!(node.block_type()));
    data.insert("tag".into(), json!(node.tag));
    data.insert("uiMetaData".into(), node.ui_meta_data());
    data
}

/// First credential subject of `document`, as a formula scope.
fn subject_scope(document: &PolicyDocument) -> Map<String, Value> {
    match document.credential_subjects().first() {
        Some(Value::Object(subject)) => subject.clone(),
        _ => match &document.document {
            Value::Object(body) => body.clone(),
            _ => Map::new(),
        },
    }
}

/// The document serialized as a scope, for dotted field paths like
/// `option.status` or `document.credentialSubject.0.field`.
fn document_scope(document: &PolicyDocument) -> Map<String, Value> {
    match serde_json::to_value(document) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
