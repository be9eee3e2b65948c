//! Fingerprints of a draft against its published form.
//!
//! Publishing regenerates block ids and moves schema references to the
//! versioned IRI; only the latter is visible to the compare engine.

use super::fixtures::*;
use pe_06_compare_engine::{
    CompareEngine, CompareOptions, CompareStatus, PolicyComparator, PropertyLevel,
};
use shared_types::entities::BlockDefinition;
use shared_types::ipc::{EngineRequest, UserRef};

async fn config_of(harness: &Harness, policy_id: &str) -> BlockDefinition {
    let policy = harness
        .ok(EngineRequest::GetPolicy {
            policy_id: policy_id.into(),
            user: UserRef::new(OWNER),
        })
        .await;
    BlockDefinition::from_config(&policy["config"]).unwrap()
}

#[tokio::test]
async fn test_publish_changes_only_schema_bound_blocks() {
    let harness = Harness::start();
    harness
        .ok(EngineRequest::CreatePolicy {
            policy: Box::new(metering_policy("p-meter", TOKEN_ID)),
        })
        .await;
    let draft = config_of(&harness, "p-meter").await;
    harness
        .ok(EngineRequest::PublishPolicy {
            policy_id: "p-meter".into(),
            owner: OWNER.into(),
            version: "1.0.0".into(),
        })
        .await;
    let published = config_of(&harness, "p-meter").await;
    assert_ne!(draft.id, published.id);

    let structural = CompareEngine::new(CompareOptions {
        property_level: PropertyLevel::None,
        ..CompareOptions::default()
    });
    assert!(structural.compare(&draft, &published).is_equal());

    let full = CompareEngine::new(CompareOptions::default()).compare(&draft, &published);
    assert_eq!(full.status_of("report"), Some(CompareStatus::Different));
    assert_eq!(full.status_of("save"), Some(CompareStatus::Equal));
    assert_eq!(full.status_of("mint"), Some(CompareStatus::Equal));
    assert_eq!(full.status_of("root"), Some(CompareStatus::Different));
}
