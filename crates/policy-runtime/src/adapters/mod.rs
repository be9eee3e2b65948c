//! # Adapter Implementations
//!
//! Concrete implementations of the outbound ports of every subsystem,
//! backed by memory, plus the embedded worker that answers the task bus.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ PolicyEngine (pe-05)   MintOrchestrator (pe-03)            │
//! │        │ SchemaRegistry, DocumentStore,  │ KeyCustody,     │
//! │        │ CredentialService, ...          │ Federation...   │
//! │        ↓                                 ↓                 │
//! │   store.rs  credentials.rs  accounts.rs  federation.rs     │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod accounts;
pub mod credentials;
pub mod federation;
pub mod metered;
pub mod ports;
pub mod store;
pub mod worker;

pub use accounts::{AccountBook, InMemoryKeyCustody};
pub use credentials::DigestCredentialService;
pub use federation::InMemoryFederation;
pub use metered::MeteredSettlement;
pub use ports::PolicyRepository;
pub use store::{
    InMemoryDocumentStore, InMemoryPolicyRepository, InMemorySchemaRegistry,
    InMemoryTokenRegistry,
};
pub use worker::EmbeddedWorker;
