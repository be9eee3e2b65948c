//! Digest-signed credentials.
//!
//! Stand-in for a DID signing service: the proof is a SHA-256 digest of the
//! credential body keyed with the signer's account id. Verification
//! recomputes it, so any edit to an issued body fails verification.

use async_trait::async_trait;
use chrono::Utc;
use pe_05_block_tree::CredentialService;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use shared_types::entities::LedgerAccount;
use shared_types::errors::StoreError;
use uuid::Uuid;

const PROOF_TYPE: &str = "Sha256Digest2024";

#[derive(Debug, Default)]
pub struct DigestCredentialService;

impl DigestCredentialService {
    pub fn new() -> Self {
        Self
    }

    fn digest(body: &Value, verification_method: &str) -> Result<String, StoreError> {
        let bytes = serde_json::to_vec(body).map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(verification_method.as_bytes());
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl CredentialService for DigestCredentialService {
    async fn issue(
        &self,
        issuer: &str,
        signer: &LedgerAccount,
        subject: Value,
    ) -> Result<Value, StoreError> {
        let mut credential = json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "id": format!("urn:uuid:{}", Uuid::new_v4()),
            "type": ["VerifiableCredential"],
            "issuer": issuer,
            "issuanceDate": Utc::now().to_rfc3339(),
            "credentialSubject": [subject],
        });
        let hash = Self::digest(&credential, &signer.account_id)?;
        if let Some(map) = credential.as_object_mut() {
            map.insert(
                "proof".into(),
                json!({
                    "type": PROOF_TYPE,
                    "verificationMethod": signer.account_id,
                    "hash": hash,
                }),
            );
        }
        Ok(credential)
    }

    async fn verify(&self, document: &Value) -> Result<bool, StoreError> {
        let Some(map) = document.as_object() else {
            return Ok(false);
        };
        if !map.contains_key("credentialSubject") {
            return Ok(false);
        }
        let Some(proof) = map.get("proof") else {
            return Ok(false);
        };
        let (Some(method), Some(hash)) = (
            proof.get("verificationMethod").and_then(Value::as_str),
            proof.get("hash").and_then(Value::as_str),
        ) else {
            return Ok(false);
        };

        let mut body = map.clone();
        body.remove("proof");
        Ok(Self::digest(&Value::Object(body), method)? == hash)
    }
}
