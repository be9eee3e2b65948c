//! Inbound port: what policy loaders need from the converter.

use crate::domain::errors::ConversionError;
use crate::service::ConversionReport;
use shared_types::entities::Policy;

/// Brings a stored policy up to the engine's configuration shape.
pub trait PolicyMigration: Send + Sync {
    /// Migrate `policy.config` in place and stamp `policy.code_version`.
    fn convert_policy(&self, policy: &mut Policy) -> Result<ConversionReport, ConversionError>;

    /// True when `code_version` predates the engine's version.
    fn needs_migration(&self, code_version: Option<&str>) -> bool;
}
