//! Events delivered along edges.

use shared_types::entities::{DocumentPayload, EventActor, InputEventType, PolicyUser};

/// Identities travelling with an event chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventActors {
    /// Identity the current handler acts as.
    pub user: PolicyUser,
    /// User whose action started the chain.
    pub initiator: PolicyUser,
}

impl EventActors {
    /// Actors of a chain started by `user`.
    #[must_use]
    pub fn started_by(user: PolicyUser) -> Self {
        Self {
            initiator: user.clone(),
            user,
        }
    }

    /// Identity an edge with `actor` delivers with.
    #[must_use]
    pub fn resolve(&self, actor: Option<EventActor>, owner: &PolicyUser) -> Self {
        let user = match actor {
            Some(EventActor::EventInitiator) => self.initiator.clone(),
            Some(EventActor::Owner) => owner.clone(),
            None => self.user.clone(),
        };
        Self {
            user,
            initiator: self.initiator.clone(),
        }
    }
}

/// One delivery to a target block.
#[derive(Debug, Clone)]
pub struct PolicyEvent {
    pub input: InputEventType,
    pub output: String,
    pub source_tag: String,
    pub target_tag: String,
    pub actors: EventActors,
    pub data: Option<DocumentPayload>,
}

impl PolicyEvent {
    #[must_use]
    pub fn user(&self) -> &PolicyUser {
        &self.actors.user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_resolution() {
        let alice = PolicyUser::new("did:alice").with_role("Installer");
        let owner = PolicyUser::new("did:owner").as_owner();
        let chain = EventActors::started_by(alice.clone());

        let as_owner = chain.resolve(Some(EventActor::Owner), &owner);
        assert_eq!(as_owner.user, owner);
        assert_eq!(as_owner.initiator, alice);

        // Pass-through keeps the owner; initiator goes back to alice.
        assert_eq!(as_owner.resolve(None, &owner).user, owner);
        assert_eq!(as_owner.resolve(Some(EventActor::EventInitiator), &owner).user, alice);
    }
}
