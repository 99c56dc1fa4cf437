//! Access control
//!
//! A protected operation names the roles that may use it; a caller passes if
//! it holds any of them. `ADMIN` holds every role.

use super::roles::BehavioralRoles;
use crate::error::AppError;
use eventhub_core::StaticRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// A role an operation may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequiredRole {
    Admin,
    Organizer,
    Attendee,
}

impl fmt::Display for RequiredRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequiredRole::Admin => "ADMIN",
            RequiredRole::Organizer => "ORGANIZER",
            RequiredRole::Attendee => "ATTENDEE",
        })
    }
}

/// Identity attached to an authenticated request.
///
/// Built per request from the access token and fresh relationship facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub role: Option<StaticRole>,
    pub is_organizer: bool,
    pub is_attendee: bool,
}

impl SessionIdentity {
    pub fn new(user_id: Uuid, role: Option<StaticRole>, roles: BehavioralRoles) -> Self {
        Self {
            user_id,
            role,
            is_organizer: roles.is_organizer,
            is_attendee: roles.is_attendee,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(StaticRole::Admin)
    }

    pub fn has(&self, required: RequiredRole) -> bool {
        match required {
            RequiredRole::Admin => self.is_admin(),
            RequiredRole::Organizer => self.is_organizer,
            RequiredRole::Attendee => self.is_attendee,
        }
    }
}

/// Decide whether `identity` may use an operation requiring any of `required`.
///
/// An empty requirement always passes. A missing identity fails every
/// non-empty requirement.
pub fn authorize(
    required: &[RequiredRole],
    identity: Option<&SessionIdentity>,
) -> Result<(), AppError> {
    if required.is_empty() {
        return Ok(());
    }

    let identity = identity
        .ok_or_else(|| AppError::Forbidden("Not authenticated for this operation".to_string()))?;

    if identity.is_admin() || required.iter().any(|role| identity.has(*role)) {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "Requires one of: {}",
        join_roles(required)
    )))
}

pub(crate) fn join_roles(roles: &[RequiredRole]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn identity(role: Option<StaticRole>, is_organizer: bool, is_attendee: bool) -> SessionIdentity {
        SessionIdentity {
            user_id: Uuid::new_v4(),
            role,
            is_organizer,
            is_attendee,
        }
    }

    #[test]
    fn test_empty_requirement_always_passes() {
        assert!(authorize(&[], None).is_ok());
        assert!(authorize(&[], Some(&identity(None, false, false))).is_ok());
    }

    #[test]
    fn test_missing_identity_is_forbidden() {
        let result = authorize(&[RequiredRole::Attendee], None);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_admin_passes_behavioral_requirements() {
        let admin = identity(Some(StaticRole::Admin), false, false);

        assert!(authorize(&[RequiredRole::Admin], Some(&admin)).is_ok());
        assert!(authorize(&[RequiredRole::Organizer], Some(&admin)).is_ok());
        assert!(authorize(&[RequiredRole::Attendee], Some(&admin)).is_ok());
    }

    #[test]
    fn test_identity_without_facts_is_denied() {
        let nobody = identity(None, false, false);

        for required in [
            vec![RequiredRole::Organizer],
            vec![RequiredRole::Attendee],
            vec![RequiredRole::Organizer, RequiredRole::Attendee],
            vec![RequiredRole::Admin],
        ] {
            let result = authorize(&required, Some(&nobody));
            assert!(matches!(result, Err(AppError::Forbidden(_))), "{required:?}");
        }
    }

    #[test]
    fn test_any_match_grants() {
        let organizer = identity(None, true, false);
        let attendee = identity(None, false, true);
        let both = [RequiredRole::Organizer, RequiredRole::Attendee];

        assert!(authorize(&both, Some(&organizer)).is_ok());
        assert!(authorize(&both, Some(&attendee)).is_ok());
        assert!(authorize(&[RequiredRole::Organizer], Some(&attendee)).is_err());
        assert!(authorize(&[RequiredRole::Admin], Some(&organizer)).is_err());
    }

    fn required_role() -> impl Strategy<Value = RequiredRole> {
        prop_oneof![
            Just(RequiredRole::Admin),
            Just(RequiredRole::Organizer),
            Just(RequiredRole::Attendee),
        ]
    }

    proptest! {
        #[test]
        fn prop_admin_satisfies_any_requirement(
            required in proptest::collection::vec(required_role(), 0..4),
            is_organizer in any::<bool>(),
            is_attendee in any::<bool>(),
        ) {
            let admin = identity(Some(StaticRole::Admin), is_organizer, is_attendee);
            prop_assert!(authorize(&required, Some(&admin)).is_ok());
        }

        #[test]
        fn prop_grant_matches_held_roles(
            required in proptest::collection::vec(required_role(), 1..4),
            is_organizer in any::<bool>(),
            is_attendee in any::<bool>(),
        ) {
            let caller = identity(None, is_organizer, is_attendee);
            let expected = required.iter().any(|r| match r {
                RequiredRole::Admin => false,
                RequiredRole::Organizer => is_organizer,
                RequiredRole::Attendee => is_attendee,
            });
            prop_assert_eq!(authorize(&required, Some(&caller)).is_ok(), expected);
        }
    }

    #[test]
    fn test_join_roles() {
        assert_eq!(
            join_roles(&[RequiredRole::Admin, RequiredRole::Organizer]),
            "ADMIN,ORGANIZER"
        );
    }
}
