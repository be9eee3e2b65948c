//! Adapters connecting the dispatcher to the shared bus.

pub mod bus;
