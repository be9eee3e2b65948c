//! # Settlement Flows
//!
//! A submitted form travels request → save → mint; the mint block hands
//! ledger work to the dispatcher, which reaches the embedded worker over the
//! bus and resumes on the completion broadcast.

use super::fixtures::*;
use pe_05_block_tree::CredentialService;
use serde_json::json;
use shared_bus::{EngineEvent, EventFilter, EventTopic, Subscription};
use shared_types::ipc::{EngineRequest, ErrorCode, ExternalDataPayload, UserRef};

fn minted(events: &mut Subscription) -> Vec<(String, u64, String)> {
    let mut out = Vec::new();
    while let Ok(Some(event)) = events.try_recv() {
        if let EngineEvent::TokenMinted {
            token_id,
            amount,
            target,
            ..
        } = event
        {
            out.push((token_id, amount, target));
        }
    }
    out
}

fn submit(policy_id: &str, block_id: &str, value: serde_json::Value) -> EngineRequest {
    EngineRequest::SetBlockData {
        block_id: block_id.into(),
        policy_id: policy_id.into(),
        user: UserRef::new(INSTALLER),
        data: json!({ "document": value }),
    }
}

#[tokio::test]
async fn test_submitted_report_mints_to_submitter() {
    let harness = Harness::start();
    let mut external = harness
        .container()
        .bus
        .subscribe(EventFilter::topics(vec![EventTopic::External]));
    harness.publish(metering_policy("p-meter", TOKEN_ID)).await;

    let report = harness.block_id("p-meter", "report").await;
    let body = harness
        .ok(submit("p-meter", &report, json!({"value": 7})))
        .await;
    assert!(body["documentId"].is_string());

    assert_eq!(
        minted(&mut external),
        vec![(TOKEN_ID.to_string(), 14, INSTALLER_ACCOUNT.to_string())]
    );
    assert_eq!(harness.container().documents.len(), 1);
    assert!(harness.container().federation.settlements().is_empty());

    let dispatcher = &harness.container().dispatcher;
    assert_eq!(dispatcher.pending_count(), 0);
    let stats = dispatcher.stats();
    assert_eq!(stats.submitted, 2, "one mint and one transfer task");
    assert_eq!(stats.resolved, 2);
}

#[tokio::test]
async fn test_incomplete_report_is_refused_and_form_reopens() {
    let harness = Harness::start();
    let mut external = harness
        .container()
        .bus
        .subscribe(EventFilter::topics(vec![EventTopic::External]));
    harness.publish(metering_policy("p-meter", TOKEN_ID)).await;

    let report = harness.block_id("p-meter", "report").await;
    let response = harness
        .request(submit("p-meter", &report, json!({"other": 1})))
        .await;
    let error = response.error.expect("submission refused");
    assert_eq!(error.code, ErrorCode::BlockAction);
    assert_eq!(error.message, "Field value is required");

    let form = harness
        .ok(EngineRequest::GetBlockData {
            block_id: report,
            policy_id: "p-meter".into(),
            user: UserRef::new(INSTALLER),
        })
        .await;
    assert_eq!(form["active"], json!(true));

    assert!(minted(&mut external).is_empty());
    assert!(harness.container().documents.is_empty());
    assert_eq!(harness.container().dispatcher.stats().submitted, 0);
}

#[tokio::test]
async fn test_block_parents_through_broker() {
    let harness = Harness::start();
    harness.publish(metering_policy("p-meter", TOKEN_ID)).await;

    let mint = harness.block_id("p-meter", "mint").await;
    let root = harness.block_id("p-meter", "root").await;
    let parents = harness
        .ok(EngineRequest::GetBlockParents {
            block_id: mint.clone(),
            policy_id: "p-meter".into(),
        })
        .await;
    assert_eq!(parents, json!([mint, root]));

    let missing = harness
        .request(EngineRequest::BlockByTag {
            policy_id: "p-meter".into(),
            tag: "nope".into(),
        })
        .await;
    assert_eq!(missing.error.unwrap().code, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_external_data_requires_intact_credential() {
    let harness = Harness::start();
    harness.publish(sensor_policy("p-sensor")).await;

    let document = harness
        .container()
        .engine
        .services()
        .credentials
        .issue(OWNER, &account(OWNER_ACCOUNT), json!({"value": 3}))
        .await
        .unwrap();
    let payload = |document: serde_json::Value| {
        EngineRequest::ReceiveExternalData(ExternalDataPayload {
            policy_tag: "Tag_p-sensor".into(),
            block_tag: "sensor".into(),
            owner: INSTALLER.into(),
            document,
        })
    };

    let mut tampered = document.clone();
    tampered["credentialSubject"][0]["value"] = json!(30);
    let refused = harness.request(payload(tampered)).await;
    assert_eq!(refused.error.unwrap().message, "Invalid document");
    assert!(harness.container().documents.is_empty());

    let body = harness.ok(payload(document)).await;
    assert_eq!(body, json!({"accepted": 1}));
    assert_eq!(harness.container().documents.len(), 1);
}
