//! # Block Tree Subsystem
//!
//! Materializes a policy configuration into a tree of typed blocks, routes
//! events between them and answers the broker's block requests.
//!
//! ## Materialization
//!
//! - Every node gets a fresh [`BlockId`](shared_types::entities::BlockId);
//!   tags are the stable routing keys.
//! - Options are decoded into a typed [`Behavior`] per block kind. Decode and
//!   formula errors are kept on the node and surface in validation.
//! - Declared edges are indexed by source tag. Blocks with the
//!   `defaultActive` option whose kind has a default event also emit an
//!   implicit `RunEvent` to their next sibling, after the declared edges.
//!
//! ## Block kinds
//!
//! | Kind                            | get | set | run | Outputs                    |
//! |---------------------------------|-----|-----|-----|----------------------------|
//! | `interfaceContainerBlock`       |  ✓  |     |     | `RefreshEvent`             |
//! | `interfaceStepBlock`            |  ✓  |     |  ✓  | `RunEvent`, `RefreshEvent` |
//! | `interfaceDocumentsSourceBlock` |  ✓  |     |     | `RefreshEvent`             |
//! | `buttonBlock`                   |  ✓  |  ✓  |     | one per button tag         |
//! | `requestVcDocumentBlock`        |  ✓  |  ✓  |     | run, refresh, release      |
//! | `documentValidatorBlock`        |     |     |  ✓  | run, refresh, release      |
//! | `httpRequestBlock`              |     |     |  ✓  | run, refresh, release, error |
//! | `sendToGuardianBlock`           |     |     |  ✓  | run, refresh, release, error |
//! | `switchBlock`                   |     |     |  ✓  | one per condition tag      |
//! | `calculateContainerBlock`       |     |     |  ✓  | run, refresh, release, error |
//! | `calculateMathAddon`            |     |     |     |                            |
//! | `mintDocumentBlock`             |     |     |  ✓  | run, refresh, release, error |
//! | `retirementDocumentBlock`       |     |     |  ✓  | run, refresh, release, error |
//! | `externalDataBlock`             |     |     |     | run, refresh, release      |
//!
//! ## Module Structure
//!
//! ```text
//! domain/formula.rs     - expression language of switch, math and token rules
//! domain/kind.rs        - BlockKind and its static BlockAbout
//! domain/options.rs     - typed options per kind
//! domain/tree.rs        - arena tree, tag index, edges
//! domain/validation.rs  - ValidationReport, structural checks
//! ports/inbound.rs      - BlockRouter
//! ports/outbound.rs     - schema, document, credential, account, token ports
//! blocks/               - one module per behavior
//! registry.rs           - PolicyInstance, PolicyRegistry
//! service.rs            - PolicyEngine
//! ```

pub mod blocks;
pub mod domain;
pub mod ports;
pub mod registry;
pub mod service;

pub use blocks::validator::check as check_document;
pub use blocks::BlockContext;
pub use domain::errors::{EngineError, TreeError};
pub use domain::event::{EventActors, PolicyEvent};
pub use domain::formula::{Formula, FormulaError};
pub use domain::kind::{BlockAbout, BlockKind, Capability, ChildrenType};
pub use domain::options::Behavior;
pub use domain::permissions::is_allowed;
pub use domain::tree::{BlockNode, BlockTree, EventEdge};
pub use domain::validation::{BlockValidation, ValidationReport};
pub use ports::inbound::BlockRouter;
pub use ports::outbound::{
    AccountDirectory, CredentialService, DocumentQuery, DocumentStore, EngineServices,
    SchemaRegistry, TokenRegistry,
};
pub use registry::{PolicyInstance, PolicyRegistry, STEP_INDEX_FIELD};
pub use service::PolicyEngine;
