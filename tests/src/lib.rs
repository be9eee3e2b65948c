//! # Policy Engine Test Suite
//!
//! Cross-subsystem flows run against a fully wired [`policy_runtime`]
//! container with the embedded worker answering ledger tasks.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs     # runtime, accounts, tokens, schemas, policies
//!     ├── lifecycle.rs    # create / save / validate / publish / roles
//!     ├── settlement.rs   # request → save → mint through the task bus
//!     └── comparison.rs   # fingerprints of migrated policies
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pe-tests
//! cargo test -p pe-tests integration::settlement::
//! ```

pub mod integration;
