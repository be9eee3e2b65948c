//! Mint and retirement blocks.
//!
//! The amount is the block rule evaluated on every incoming credential
//! subject and summed, then scaled to ledger units for the token.

use super::{subject_scope, BlockContext};
use crate::domain::errors::EngineError;
use crate::domain::event::PolicyEvent;
use crate::domain::options::{AccountType, TokenRuleOptions};
use pe_03_mint_orchestrator::{to_ledger_units, MintContext, MintReport, MintRequest, WipeRequest};
use serde_json::{json, Value};
use shared_bus::ExternalEventType;
use shared_types::entities::output_events::ERROR_EVENT;
use shared_types::entities::{LedgerAccount, PolicyDocument, Token};
use tracing::info;
use uuid::Uuid;

/// Everything both blocks resolve before talking to the ledger.
struct Settlement<'e> {
    token: Token,
    amount: u64,
    root: LedgerAccount,
    target_account: String,
    documents: Vec<&'e PolicyDocument>,
}

async fn prepare<'e>(
    ctx: &BlockContext<'_>,
    opts: &TokenRuleOptions,
    event: &'e PolicyEvent,
) -> Result<Settlement<'e>, EngineError> {
    let documents = event
        .data
        .as_ref()
        .map(|data| data.documents())
        .filter(|documents| !documents.is_empty())
        .ok_or_else(|| ctx.action_error("Invalid document"))?;

    let token_id = opts
        .token_id
        .as_deref()
        .ok_or_else(|| ctx.action_error("Token is not set"))?;
    let token = ctx
        .services()
        .tokens
        .get_token(token_id)
        .await?
        .ok_or_else(|| ctx.action_error("Bad token id"))?;
    let rule = opts
        .rule_formula
        .as_ref()
        .ok_or_else(|| ctx.action_error("Rule is not set"))?;

    let mut total = 0.0;
    for document in &documents {
        total += rule
            .evaluate_number(&subject_scope(document))
            .map_err(|e| ctx.action_error(format!("Rule failed: {e}")))?;
    }
    let amount = to_ledger_units(total, &token);
    if amount == 0 {
        return Err(ctx.action_error("Invalid token value"));
    }

    let accounts = &ctx.services().accounts;
    let root = accounts
        .ledger_account(&ctx.instance.owner)
        .await?
        .ok_or_else(|| ctx.action_error("Root account not found"))?;
    let target_account = match opts.account_type {
        AccountType::Default => accounts
            .ledger_account(&documents[0].owner)
            .await?
            .map(|account| account.account_id)
            .ok_or_else(|| ctx.action_error("Target account not found"))?,
        AccountType::Custom => {
            let field = opts.account_id.as_deref().unwrap_or_default();
            subject_scope(documents[0])
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ctx.action_error("Target account is not set"))?
        }
    };

    Ok(Settlement {
        token,
        amount,
        root,
        target_account,
        documents,
    })
}

fn mint_context(ctx: &BlockContext<'_>) -> MintContext {
    MintContext {
        policy_id: ctx.instance.policy_id.clone(),
        instance_topic_id: ctx.instance.instance_topic_id.clone(),
        block_tag: Some(ctx.node().tag.clone()),
        dry_run: ctx.instance.dry_run,
    }
}

pub(super) async fn mint(
    ctx: &BlockContext<'_>,
    opts: &TokenRuleOptions,
    event: PolicyEvent,
) -> Result<(), EngineError> {
    let result = async {
        let settlement = prepare(ctx, opts, &event).await?;
        let memo = settlement
            .documents
            .iter()
            .map(|d| d.id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let request = MintRequest {
            owner: settlement.documents[0].owner.clone(),
            documents: settlement.documents.iter().map(|d| d.document.clone()).collect(),
            token: settlement.token.clone(),
            amount: settlement.amount,
            root: settlement.root,
            target_account: settlement.target_account.clone(),
            correlation_id: Uuid::new_v4().to_string(),
            memo,
        };
        let report = ctx
            .services()
            .settlement
            .mint(&mint_context(ctx), request)
            .await
            .map_err(|e| ctx.action_error(e.to_string()))?;
        Ok::<_, EngineError>((
            settlement.token,
            settlement.amount,
            settlement.target_account,
            report,
        ))
    }
    .await;

    let (token, amount, target, report) = match result {
        Ok(done) => done,
        Err(err) => {
            ctx.trigger(ERROR_EVENT, &event.actors, None).await?;
            return Err(err);
        }
    };

    let complete = match &report {
        MintReport::Ledger(ledger) => ledger.is_complete(),
        MintReport::Federated { .. } => true,
    };
    info!(
        policy_id = %ctx.instance.policy_id,
        token_id = %token.token_id,
        amount,
        target = %target,
        complete,
        "[pe-05] mint settled"
    );
    ctx.external(
        ExternalEventType::TokenMinted,
        Some(event.user()),
        json!({ "tokenId": token.token_id, "amount": amount, "target": target }),
    )
    .await;

    if let Some(data) = event.data.clone() {
        ctx.emit_result(&event.actors, data).await?;
    }
    Ok(())
}

pub(super) async fn retire(
    ctx: &BlockContext<'_>,
    opts: &TokenRuleOptions,
    event: PolicyEvent,
) -> Result<(), EngineError> {
    let result = async {
        let settlement = prepare(ctx, opts, &event).await?;
        let request = WipeRequest {
            token: settlement.token.clone(),
            amount: settlement.amount,
            root: settlement.root,
            target_account: settlement.target_account.clone(),
            correlation_id: Uuid::new_v4().to_string(),
        };
        ctx.services()
            .settlement
            .wipe(&mint_context(ctx), request)
            .await
            .map_err(|e| ctx.action_error(e.to_string()))?;
        Ok::<_, EngineError>((settlement.token, settlement.amount, settlement.target_account))
    }
    .await;

    let (token, amount, target) = match result {
        Ok(done) => done,
        Err(err) => {
            ctx.trigger(ERROR_EVENT, &event.actors, None).await?;
            return Err(err);
        }
    };

    ctx.external(
        ExternalEventType::TokenWiped,
        Some(event.user()),
        json!({ "tokenId": token.token_id, "amount": amount, "target": target }),
    )
    .await;

    if let Some(data) = event.data.clone() {
        ctx.emit_result(&event.actors, data).await?;
    }
    Ok(())
}
