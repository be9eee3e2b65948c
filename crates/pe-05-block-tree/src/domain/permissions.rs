//! Role gating for blocks.

use shared_types::entities::roles::{ANY_ROLE, NO_ROLE, OWNER};
use shared_types::entities::PolicyUser;

/// Whether `user` may reach a block declaring `permissions`.
///
/// The policy owner always may. Otherwise the user's role must be listed,
/// or `ANY_ROLE` must be present, or `NO_ROLE` for users without a role.
#[must_use]
pub fn is_allowed(permissions: &[String], user: &PolicyUser) -> bool {
    if user.is_owner {
        return true;
    }
    permissions.iter().any(|permission| match permission.as_str() {
        ANY_ROLE => true,
        NO_ROLE => user.role.is_none(),
        OWNER => false,
        role => user.role.as_deref() == Some(role),
    })
}
