//! Inbound port used by diff tooling.

use crate::domain::model::PolicyModel;
use crate::domain::result::CompareResult;
use shared_types::entities::BlockDefinition;

pub trait PolicyComparator: Send + Sync {
    fn fingerprint(&self, root: &BlockDefinition) -> PolicyModel;

    fn compare(&self, left: &BlockDefinition, right: &BlockDefinition) -> CompareResult;
}
