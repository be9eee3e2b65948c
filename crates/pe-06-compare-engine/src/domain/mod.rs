//! Domain layer of the compare engine.

pub mod fingerprint;
pub mod model;
pub mod options;
pub mod result;
