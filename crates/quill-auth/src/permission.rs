use std::ops::BitOr;

/// A single capability bit. Roles hold an OR of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission(u8);

impl Permission {
    pub const FOLLOW: Permission = Permission(0x01);
    pub const COMMENT: Permission = Permission(0x02);
    pub const WRITE_ARTICLES: Permission = Permission(0x04);
    pub const MODERATE_COMMENTS: Permission = Permission(0x08);
    pub const ADMINISTER: Permission = Permission(0x80);

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Permission) -> Permission {
        Permission(self.0 | rhs.0)
    }
}

/// Containment check: every bit of `needed` must be set in `role_bits`.
pub fn can(role_bits: u8, needed: Permission) -> bool {
    role_bits & needed.0 == needed.0
}

/// A named role to seed into storage. The table is fixed; seeding
/// upserts by name so re-running it never duplicates roles.
pub struct RoleSpec {
    pub name: &'static str,
    pub permissions: u8,
    pub is_default: bool,
}

/// The built-in role table. Exactly one entry is the default.
pub fn builtin_roles() -> [RoleSpec; 3] {
    [
        RoleSpec {
            name: "User",
            permissions: (Permission::FOLLOW | Permission::COMMENT | Permission::WRITE_ARTICLES)
                .bits(),
            is_default: true,
        },
        RoleSpec {
            name: "Moderator",
            permissions: (Permission::FOLLOW
                | Permission::COMMENT
                | Permission::WRITE_ARTICLES
                | Permission::MODERATE_COMMENTS)
                .bits(),
            is_default: false,
        },
        RoleSpec {
            name: "Administrator",
            permissions: 0xff,
            is_default: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrator_satisfies_everything() {
        for p in [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLES,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ] {
            assert!(can(0xff, p));
        }
    }

    #[test]
    fn partial_role_fails_missing_capability() {
        let bits = (Permission::FOLLOW | Permission::COMMENT).bits();
        assert!(can(bits, Permission::FOLLOW));
        assert!(can(bits, Permission::COMMENT));
        assert!(!can(bits, Permission::MODERATE_COMMENTS));
        assert!(!can(bits, Permission::ADMINISTER));
    }

    #[test]
    fn no_role_satisfies_nothing() {
        assert!(!can(0, Permission::FOLLOW));
    }

    #[test]
    fn exactly_one_default_role() {
        let defaults = builtin_roles().iter().filter(|r| r.is_default).count();
        assert_eq!(defaults, 1);
    }
}
