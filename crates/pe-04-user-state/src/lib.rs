//! # UserState Store
//!
//! Mutable scratch state for every `(block, user)` pair of a materialized
//! policy tree. Lives as long as the tree; nothing here is persisted.
//!
//! ## Rules
//!
//! - `get` lazily creates a bag from the block's registered defaults
//!   (for example `{"active": true}`).
//! - `set` merges the patch into the bag, key by key. It never replaces the bag.
//! - A block may stash a restore value. Reads show it back until the next
//!   successful write from the same user, which clears it.
//!
//! Independent users never share a slot, so concurrent sessions do not
//! contend on the same entry.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::StateError;
pub use domain::state::{StateBag, StateKey, ACTIVE_FIELD};
pub use ports::inbound::UserStateApi;
pub use service::UserStateStore;
