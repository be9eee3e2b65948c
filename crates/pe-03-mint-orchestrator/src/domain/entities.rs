//! Settlement request and report types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::entities::{Did, LedgerAccount, PolicyId, Token, TokenType};
use std::fmt;

/// Key slots held in custody for a token owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    TokenTreasuryKey,
    TokenSupplyKey,
    TokenWipeKey,
}

impl KeyType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenTreasuryKey => "TOKEN_TREASURY_KEY",
            Self::TokenSupplyKey => "TOKEN_SUPPLY_KEY",
            Self::TokenWipeKey => "TOKEN_WIPE_KEY",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treasury and supply credentials resolved for one mint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub token_id: String,
    pub treasury_id: String,
    pub treasury_key: String,
    pub supply_key: String,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("token_id", &self.token_id)
            .field("treasury_id", &self.treasury_id)
            .finish_non_exhaustive()
    }
}

/// Where a settlement runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MintContext {
    pub policy_id: PolicyId,
    /// Instance topic used for the federation lookup.
    pub instance_topic_id: Option<String>,
    pub block_tag: Option<String>,
    pub dry_run: bool,
}

/// Mint `amount` ledger units of `token` to `target_account`.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub token: Token,
    /// Ledger units; see [`to_ledger_units`].
    pub amount: u64,
    /// Owner of the credential being settled.
    pub owner: Did,
    /// Account paying for the ledger operations.
    pub root: LedgerAccount,
    pub target_account: String,
    /// Correlation uuid stamped into NFT metadata and federation messages.
    pub correlation_id: String,
    pub memo: String,
    /// Credential bodies the mint is issued for.
    pub documents: Vec<Value>,
}

/// Wipe `amount` ledger units of `token` from `target_account`.
#[derive(Debug, Clone)]
pub struct WipeRequest {
    pub token: Token,
    pub amount: u64,
    pub root: LedgerAccount,
    pub target_account: String,
    pub correlation_id: String,
}

/// Outcome of the ledger path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReport {
    pub mint_id: String,
    pub requested: u64,
    /// Units minted (serial count for NFTs).
    pub minted: u64,
    pub serials: Vec<u64>,
    /// Mint tasks submitted.
    pub mint_chunks: usize,
    pub failed_mint_chunks: usize,
    pub transferred: u64,
    /// Transfer tasks submitted.
    pub transfer_chunks: usize,
    pub failed_transfer_chunks: usize,
}

impl LedgerReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_mint_chunks == 0
            && self.failed_transfer_chunks == 0
            && self.transferred == self.requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintReport {
    Ledger(LedgerReport),
    Federated {
        hash: String,
        settlement_recorded: bool,
    },
}

/// Federation message announcing a mint to the main instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationMessage {
    pub hash: String,
    pub message_id: String,
    pub token_id: String,
    pub amount: u64,
    pub memo: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintConfig {
    pub chunk_size: usize,
    pub priority: u8,
    /// Attempt budget per task; 0 uses the dispatcher default.
    pub attempts: u32,
    /// Largest serial count a single non-fungible mint may request.
    pub max_nft_amount: u64,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            priority: 1,
            attempts: 0,
            max_nft_amount: crate::DEFAULT_MAX_NFT_AMOUNT,
        }
    }
}

/// Convert a rule amount into ledger units.
///
/// Fungible tokens scale by `10^decimals`; non-fungible amounts are whole
/// serial counts. Negative and non-finite amounts yield 0.
#[must_use]
pub fn to_ledger_units(amount: f64, token: &Token) -> u64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    let units = match token.token_type {
        TokenType::Fungible => (amount * 10f64.powi(token.decimals as i32)).round(),
        TokenType::NonFungible => amount.floor(),
    };
    if units >= u64::MAX as f64 {
        u64::MAX
    } else {
        units as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(token_type: TokenType, decimals: u32) -> Token {
        Token {
            token_id: "0.0.5".into(),
            token_name: "Carbon".into(),
            token_type,
            decimals,
            owner: "did:owner".into(),
            enable_wipe: true,
        }
    }

    #[test]
    fn test_fungible_amounts_scale_by_decimals() {
        assert_eq!(to_ledger_units(1.5, &token(TokenType::Fungible, 2)), 150);
        assert_eq!(to_ledger_units(3.0, &token(TokenType::Fungible, 0)), 3);
    }

    #[test]
    fn test_non_fungible_amounts_floor() {
        assert_eq!(to_ledger_units(2.9, &token(TokenType::NonFungible, 2)), 2);
        assert_eq!(to_ledger_units(-1.0, &token(TokenType::NonFungible, 0)), 0);
        assert_eq!(to_ledger_units(f64::NAN, &token(TokenType::Fungible, 0)), 0);
    }

    #[test]
    fn test_token_config_debug_hides_keys() {
        let config = TokenConfig {
            token_id: "0.0.5".into(),
            treasury_id: "0.0.1".into(),
            treasury_key: "secret-treasury".into(),
            supply_key: "secret-supply".into(),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
    }
}
