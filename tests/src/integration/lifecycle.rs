//! # Policy Lifecycle Flows
//!
//! Create, validate, publish and role management through the broker, with
//! the schema registry and the block tree registry observed directly.

use super::fixtures::*;
use pe_05_block_tree::SchemaRegistry;
use serde_json::json;
use shared_types::entities::SchemaStatus;
use shared_types::ipc::{EngineRequest, ErrorCode, UserRef};

fn publish(policy_id: &str, version: &str) -> EngineRequest {
    EngineRequest::PublishPolicy {
        policy_id: policy_id.into(),
        owner: OWNER.into(),
        version: version.into(),
    }
}

fn get(policy_id: &str, did: &str) -> EngineRequest {
    EngineRequest::GetPolicy {
        policy_id: policy_id.into(),
        user: UserRef::new(did),
    }
}

#[tokio::test]
async fn test_publish_materializes_and_publishes_schemas() {
    let harness = Harness::start();
    harness.publish(metering_policy("p-meter", TOKEN_ID)).await;

    let instance = harness
        .container()
        .engine
        .registry()
        .get("p-meter")
        .expect("published policy is routable");
    assert_eq!(instance.owner, OWNER);

    let published = format!("{SCHEMA_IRI}&1.0.0");
    let schema = harness
        .container()
        .schemas
        .get_schema_by_iri(&published, None)
        .await
        .unwrap()
        .expect("schema published under its versioned IRI");
    assert_eq!(schema.status, SchemaStatus::Published);

    let policy = harness.ok(get("p-meter", OWNER)).await;
    assert_eq!(policy["status"], json!("PUBLISH"));
    assert_eq!(policy["version"], json!("1.0.0"));
    assert_eq!(
        policy["config"]["children"][0]["schema"],
        json!(published),
        "blocks follow the published schema"
    );
}

#[tokio::test]
async fn test_publish_rejects_bad_versions() {
    let harness = Harness::start();
    harness.publish(metering_policy("p-meter", TOKEN_ID)).await;

    for version in ["1.0", "one", "1.0.0"] {
        let response = harness.request(publish("p-meter", version)).await;
        let error = response.error.expect("publish refused");
        assert_eq!(error.code, ErrorCode::BadRequest, "{version}");
    }

    let response = harness.request(publish("p-meter", "1.0.0")).await;
    assert_eq!(
        response.error.unwrap().message,
        "Version must be greater than 1.0.0"
    );
}

#[tokio::test]
async fn test_invalid_policy_stays_draft() {
    let harness = Harness::start();
    harness
        .ok(EngineRequest::CreatePolicy {
            policy: Box::new(metering_policy("p-bad", "0.0.404")),
        })
        .await;

    let validation = harness
        .ok(EngineRequest::ValidatePolicy {
            policy_id: "p-bad".into(),
        })
        .await;
    assert_eq!(validation["results"]["isValid"], json!(false));

    let outcome = harness.ok(publish("p-bad", "1.0.0")).await;
    assert_eq!(outcome["isValid"], json!(false));
    let messages = outcome["errors"]["blocks"].to_string();
    assert!(messages.contains("Token with id 0.0.404 does not exist"));

    assert!(harness.container().engine.registry().get("p-bad").is_none());
    let policy = harness.ok(get("p-bad", OWNER)).await;
    assert_eq!(policy["status"], json!("DRAFT"));
}

#[tokio::test]
async fn test_drafts_are_owner_only_and_frozen_after_publish() {
    let harness = Harness::start();
    let policy = metering_policy("p-meter", TOKEN_ID);
    let config = policy.config.clone().unwrap();
    harness
        .ok(EngineRequest::CreatePolicy {
            policy: Box::new(policy.clone()),
        })
        .await;

    let duplicate = harness
        .request(EngineRequest::CreatePolicy {
            policy: Box::new(policy),
        })
        .await;
    assert_eq!(duplicate.error.unwrap().code, ErrorCode::BadRequest);

    let foreign = harness
        .request(EngineRequest::SavePolicy {
            policy_id: "p-meter".into(),
            owner: INSTALLER.into(),
            config: config.clone(),
        })
        .await;
    assert_eq!(foreign.error.unwrap().code, ErrorCode::PermissionDenied);

    let saved = harness
        .ok(EngineRequest::SavePolicy {
            policy_id: "p-meter".into(),
            owner: OWNER.into(),
            config: config.clone(),
        })
        .await;
    assert_eq!(saved["codeVersion"], json!("1.4.0"));
    assert!(saved.get("registeredUsers").is_none());

    harness.ok(publish("p-meter", "1.0.0")).await;
    let frozen = harness
        .request(EngineRequest::SavePolicy {
            policy_id: "p-meter".into(),
            owner: OWNER.into(),
            config,
        })
        .await;
    assert_eq!(
        frozen.error.unwrap().message,
        "Policy is published and cannot be changed"
    );
}

#[tokio::test]
async fn test_user_roles() {
    let harness = Harness::start();
    harness.publish(metering_policy("p-meter", TOKEN_ID)).await;

    let owner = harness.ok(get("p-meter", OWNER)).await;
    assert_eq!(owner["userRoles"], json!(["Administrator"]));

    let stranger = harness.ok(get("p-meter", INSTALLER)).await;
    assert_eq!(stranger["userRoles"], json!(["The user does not have a role"]));

    harness
        .ok(EngineRequest::AssignRole {
            policy_id: "p-meter".into(),
            owner: OWNER.into(),
            did: INSTALLER.into(),
            role: "Installer".into(),
        })
        .await;
    let installer = harness.ok(get("p-meter", INSTALLER)).await;
    assert_eq!(installer["userRoles"], json!(["Installer"]));
    assert!(installer.get("registeredUsers").is_none());

    let instance = harness.container().engine.registry().get("p-meter").unwrap();
    assert_eq!(instance.role_of(INSTALLER).as_deref(), Some("Installer"));

    let unknown = harness.request(get("p-missing", OWNER)).await;
    assert_eq!(unknown.error.unwrap().code, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_broker_refuses_stale_envelopes() {
    use policy_runtime::handlers::RequestMessage;
    use shared_types::envelope::EngineMessage;

    let harness = Harness::start();
    let mut message: RequestMessage = EngineMessage::new("gateway", get("p-meter", OWNER));
    message.timestamp -= RequestMessage::MAX_AGE + 1;
    let correlation_id = message.correlation_id;

    let reply = harness.broker.send(message).await.unwrap();
    assert_eq!(reply.correlation_id, correlation_id);
    assert_eq!(reply.sender, "policy-engine");
    assert_eq!(reply.payload.error.unwrap().message, "Request expired");
}
