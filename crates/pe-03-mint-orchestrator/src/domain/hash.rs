//! Credential hashing for federation settlement.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fields that differ between federation members for the same credential.
const VOLATILE_FIELDS: [&str; 3] = ["id", "policyId", "ref"];

/// Hex SHA-256 over the credential subjects of `documents`.
///
/// Subjects are hashed without instance-specific fields, so the same
/// credential issued by two federated instances yields the same hash.
#[must_use]
pub fn credential_hash(documents: &[Value]) -> String {
    let subjects: Vec<Value> = documents.iter().map(normalized_subjects).collect();
    let bytes = serde_json::to_vec(&subjects).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

fn normalized_subjects(document: &Value) -> Value {
    let subjects = match document.get("credentialSubject") {
        Some(Value::Array(items)) => items.clone(),
        Some(single) => vec![single.clone()],
        None => vec![document.clone()],
    };
    Value::Array(
        subjects
            .into_iter()
            .map(|mut subject| {
                if let Some(map) = subject.as_object_mut() {
                    for field in VOLATILE_FIELDS {
                        map.remove(field);
                    }
                }
                subject
            })
            .collect(),
    )
}
