use serde::{Deserialize, Serialize};

/// Role tier used for access control.
///
/// Tiers form a strict total order (`User < Moder < Tester < Hacker`); a higher
/// tier passes every check a lower tier passes. The derived `Ord` follows the
/// declaration order and agrees with [`Role::access_level`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Moder,
    Tester,
    Hacker,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Moder, Role::Tester, Role::Hacker];

    /// Integer rank in `0..=3`.
    pub const fn access_level(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Moder => 1,
            Role::Tester => 2,
            Role::Hacker => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Moder => "MODER",
            Role::Tester => "TESTER",
            Role::Hacker => "HACKER",
        }
    }

    /// Strict parse of a role label (case-insensitive, surrounding whitespace ignored).
    pub fn parse(label: &str) -> Option<Role> {
        let label = label.trim();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(label))
    }

    /// Lenient mapping used for presented credentials: unknown labels fall back to `User`.
    pub fn from_label(label: &str) -> Role {
        Role::parse(label).unwrap_or(Role::User)
    }
}

/// Access level of an arbitrary role label; unrecognized labels rank lowest.
pub fn access_level_of(label: &str) -> u8 {
    Role::from_label(label).access_level()
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn levels_are_strictly_increasing() {
        assert!(Role::Hacker.access_level() > Role::Tester.access_level());
        assert!(Role::Tester.access_level() > Role::Moder.access_level());
        assert!(Role::Moder.access_level() > Role::User.access_level());
        assert!(Role::User.access_level() >= access_level_of("ADMIN"));
    }

    #[test]
    fn parse_is_case_insensitive_and_strict() {
        assert_eq!(Role::parse("moder"), Some(Role::Moder));
        assert_eq!(Role::parse(" HACKER "), Some(Role::Hacker));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::from_label("root"), Role::User);
    }

    #[test]
    fn serializes_as_upper_case_label() {
        let json = serde_json::to_string(&Role::Tester).unwrap();
        assert_eq!(json, "\"TESTER\"");
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        /// Property: the derived order and the numeric access level agree.
        #[test]
        fn order_matches_access_level(a in any_role(), b in any_role()) {
            prop_assert_eq!(a.cmp(&b), a.access_level().cmp(&b.access_level()));
        }

        /// Property: any label that is not a role name ranks at the bottom.
        #[test]
        fn unknown_labels_rank_lowest(label in "[a-z]{1,12}") {
            prop_assume!(Role::parse(&label).is_none());
            prop_assert_eq!(access_level_of(&label), 0);
        }
    }
}
