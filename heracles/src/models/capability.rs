//! Capability flags carried independently by accounts and by API tokens.
//!
//! Both sets are persisted as a single BIGINT bitset but are exposed through
//! typed wrappers with named predicates, so an account flag can never be
//! checked against a token by accident.

use serde::{Deserialize, Serialize};

macro_rules! capability_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$flag_meta:meta])* const $flag:ident = $bit:expr; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(i64);

        impl $name {
            $( $(#[$flag_meta])* pub const $flag: $name = $name(1 << $bit); )+

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn from_bits(bits: i64) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> i64 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            #[must_use]
            pub const fn without(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }
        }
    };
}

capability_set! {
    /// Account-level privileges.
    pub struct UserFlags {
        /// May manage users, realms, grants and read the audit log.
        const ADMIN = 0;
    }
}

capability_set! {
    /// Per-token privileges, never inherited from the owning account.
    pub struct TokenFlags {
        /// May authenticate against the management API.
        const API = 0;
    }
}

impl UserFlags {
    pub fn has_admin(self) -> bool {
        self.contains(Self::ADMIN)
    }
}

impl TokenFlags {
    pub fn has_api_access(self) -> bool {
        self.contains(Self::API)
    }

    /// Flags for a freshly created token: API access unless opted out.
    pub fn for_new_token(api_access: bool) -> Self {
        if api_access {
            Self::API
        } else {
            Self::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_admin_flag() {
        assert!(!UserFlags::empty().has_admin());
        assert!(UserFlags::empty().with(UserFlags::ADMIN).has_admin());
        assert!(!UserFlags::ADMIN.without(UserFlags::ADMIN).has_admin());
    }

    #[test]
    fn test_token_defaults_to_api_access() {
        assert!(TokenFlags::for_new_token(true).has_api_access());
        assert!(!TokenFlags::for_new_token(false).has_api_access());
    }

    #[test]
    fn test_unknown_bits_are_preserved() {
        let flags = TokenFlags::from_bits(0b110);
        assert!(!flags.has_api_access());
        assert_eq!(flags.with(TokenFlags::API).bits(), 0b111);
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&UserFlags::ADMIN).unwrap();
        assert_eq!(json, "1");
    }
}
