//! Behavioral role resolution
//!
//! Organizer and attendee privileges are derived from relationship facts on
//! every authentication and never cached.

use crate::error::AppError;
use eventhub_core::RelationshipLookup;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BehavioralRoles {
    /// Owns at least one event
    pub is_organizer: bool,
    /// Holds at least one event registration
    pub is_attendee: bool,
}

#[derive(Clone)]
pub struct RoleResolver {
    lookup: Arc<dyn RelationshipLookup>,
}

impl RoleResolver {
    pub fn new(lookup: Arc<dyn RelationshipLookup>) -> Self {
        Self { lookup }
    }

    pub async fn resolve(&self, user_id: Uuid) -> Result<BehavioralRoles, AppError> {
        let (is_organizer, is_attendee) = tokio::try_join!(
            self.lookup.owns_any_event(user_id),
            self.lookup.has_any_registration(user_id),
        )?;

        Ok(BehavioralRoles {
            is_organizer,
            is_attendee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventhub_core::InMemoryStore;

    #[tokio::test]
    async fn test_no_facts_means_no_roles() {
        let resolver = RoleResolver::new(Arc::new(InMemoryStore::new()));
        let roles = resolver.resolve(Uuid::new_v4()).await.unwrap();
        assert_eq!(roles, BehavioralRoles::default());
    }

    #[tokio::test]
    async fn test_roles_follow_relationship_facts() {
        let store = Arc::new(InMemoryStore::new());
        let resolver = RoleResolver::new(store.clone());
        let user_id = Uuid::new_v4();

        store.add_event_owner(user_id).await;
        let roles = resolver.resolve(user_id).await.unwrap();
        assert!(roles.is_organizer);
        assert!(!roles.is_attendee);

        // recomputed, not cached
        store.add_registration(user_id).await;
        let roles = resolver.resolve(user_id).await.unwrap();
        assert!(roles.is_organizer);
        assert!(roles.is_attendee);
    }
}
