use serde::Serialize;

use cyberbank_core::UserId;

use crate::{Claims, Role};

/// An authenticated caller: identity plus the effective role tier.
///
/// Built by the access guard from decoded claims; handlers never see raw tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: UserId,
    role: Role,
    claims: Claims,
}

impl Principal {
    pub fn new(claims: Claims, role: Role) -> Self {
        Self {
            user_id: claims.subject(),
            role,
            claims,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// True when the caller is `owner` or holds at least `delegate_tier`.
    pub fn acts_for(&self, owner: UserId, delegate_tier: Role) -> bool {
        self.user_id == owner || is_authorized(self.role, delegate_tier)
    }
}

/// Role policy decision.
///
/// - No IO
/// - No panics
pub fn is_authorized(presented: Role, required: Role) -> bool {
    presented.access_level() >= required.access_level()
}

/// Summary of a decision, for audit logs and the claims-inspection endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required: Role,
    pub presented: Role,
    pub required_level: u8,
    pub presented_level: u8,
    pub granted: bool,
    pub reason: String,
}

pub fn explain_authorization(principal: &Principal, required: Role) -> AuthorizationExplanation {
    let granted = is_authorized(principal.role(), required);
    let reason = if granted {
        format!(
            "role {} (level {}) covers {} (level {})",
            principal.role(),
            principal.role().access_level(),
            required,
            required.access_level()
        )
    } else {
        format!(
            "role {} (level {}) is below {} (level {})",
            principal.role(),
            principal.role().access_level(),
            required,
            required.access_level()
        )
    };

    AuthorizationExplanation {
        required,
        presented: principal.role(),
        required_level: required.access_level(),
        presented_level: principal.role().access_level(),
        granted,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn principal(id: i64, role: Role) -> Principal {
        let claims = Claims::builder(UserId::new(id))
            .role(role)
            .valid_for(Utc::now(), Duration::minutes(1));
        Principal::new(claims, role)
    }

    #[test]
    fn higher_tiers_pass_lower_gates() {
        assert!(is_authorized(Role::Hacker, Role::User));
        assert!(is_authorized(Role::Tester, Role::Moder));
        assert!(is_authorized(Role::Moder, Role::Moder));
        assert!(!is_authorized(Role::User, Role::Moder));
    }

    #[test]
    fn acts_for_owner_or_delegate_tier() {
        let user = principal(5, Role::User);
        assert!(user.acts_for(UserId::new(5), Role::Moder));
        assert!(!user.acts_for(UserId::new(6), Role::Moder));
        assert!(principal(9, Role::Moder).acts_for(UserId::new(6), Role::Moder));
    }

    #[test]
    fn explanation_mentions_levels() {
        let e = explain_authorization(&principal(1, Role::User), Role::Tester);
        assert!(!e.granted);
        assert_eq!(e.required_level, 2);
        assert!(e.reason.contains("below"));
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        /// Property: the decision is exactly `level(presented) >= level(required)`
        /// and therefore monotone in the presented role.
        #[test]
        fn decision_is_monotone(presented in any_role(), higher in any_role(), required in any_role()) {
            prop_assert_eq!(
                is_authorized(presented, required),
                presented.access_level() >= required.access_level()
            );
            if higher >= presented && is_authorized(presented, required) {
                prop_assert!(is_authorized(higher, required));
            }
        }
    }
}
