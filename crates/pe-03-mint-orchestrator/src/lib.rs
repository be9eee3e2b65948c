//! # Mint Orchestrator Subsystem
//!
//! Turns an approved credential into ledger operations, or into a federation
//! settlement message when the user's policy instance is federated.
//!
//! ## Paths
//!
//! | Path | Tasks | Failure policy |
//! |------|-------|----------------|
//! | Non-fungible | `MINT_NFT` per chunk of 10, then `TRANSFER_NFT` per chunk of 10 serials | per chunk: failed chunks contribute nothing, the rest continues |
//! | Fungible | one `MINT_FT`, then one `TRANSFER_FT` | best effort, logged |
//! | Federation | none; synchronization message + `Waiting` settlement on `Main` | fail-fast |
//! | Wipe | one `WIPE_TOKEN` | fail-fast |
//!
//! Chunk fan-out uses [`scatter_gather`](domain::scatter::scatter_gather), which
//! waits for every chunk and returns successes and failures side by side.
//! Serial order across chunks is not guaranteed to follow the request.
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `TaskSubmitter` (pe-02) | Ledger work on the worker pool |
//! | `KeyCustody` | Treasury, supply and wipe keys per token owner |
//! | `FederationDirectory` | `MultiPolicyLink` lookup and settlement records |
//! | `SynchronizationChannel` | Federation settlement topic |
//! | `AccountResolver` | Ledger account of a DID |
//! | `EventPublisher` (shared-bus) | `TokenMinted` notifications |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::bus::BusSynchronizationChannel;
pub use domain::entities::{
    to_ledger_units, KeyType, LedgerReport, MintConfig, MintContext, MintReport, MintRequest,
    SynchronizationMessage, TokenConfig, WipeRequest,
};
pub use domain::errors::{LedgerError, MintError};
pub use domain::hash::credential_hash;
pub use domain::scatter::{chunk_sizes, scatter_gather, split_chunks, ScatterResult};
pub use ports::inbound::TokenSettlement;
pub use ports::outbound::{AccountResolver, FederationDirectory, KeyCustody, SynchronizationChannel};
pub use service::MintOrchestrator;

/// Items per mint or transfer task.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Serials per non-fungible mint request.
pub const DEFAULT_MAX_NFT_AMOUNT: u64 = 10_000;

/// Largest fungible amount the ledger accepts (signed 64-bit).
pub const MAX_FT_AMOUNT: u64 = i64::MAX as u64;
