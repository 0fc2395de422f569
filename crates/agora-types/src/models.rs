use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Group privilege bitmask.
///
/// Stored and transferred as a fixed-width string of `0`/`1` characters, one
/// per privilege in declaration order: `manage_sections`, `manage_groups`,
/// `manage_permissions`, `moderate`. `"1111"` grants everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Privileges(u8);

impl Privileges {
    pub const NONE: Self = Self(0);
    pub const MANAGE_SECTIONS: Self = Self(1 << 0);
    pub const MANAGE_GROUPS: Self = Self(1 << 1);
    pub const MANAGE_PERMISSIONS: Self = Self(1 << 2);
    pub const MODERATE: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    const ORDER: [Self; 4] = [
        Self::MANAGE_SECTIONS,
        Self::MANAGE_GROUPS,
        Self::MANAGE_PERMISSIONS,
        Self::MODERATE,
    ];

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Privileges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in Self::ORDER {
            f.write_str(if self.contains(flag) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid privilege string {0:?}: expected {len} characters of '0' or '1'", len = Privileges::ORDER.len())]
pub struct ParsePrivilegesError(pub String);

impl FromStr for Privileges {
    type Err = ParsePrivilegesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::ORDER.len() {
            return Err(ParsePrivilegesError(s.to_string()));
        }

        let mut privileges = Self::NONE;
        for (flag, c) in Self::ORDER.iter().zip(s.chars()) {
            match c {
                '1' => privileges = privileges | *flag,
                '0' => {}
                _ => return Err(ParsePrivilegesError(s.to_string())),
            }
        }
        Ok(privileges)
    }
}

impl TryFrom<String> for Privileges {
    type Error = ParsePrivilegesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Privileges> for String {
    fn from(value: Privileges) -> Self {
        value.to_string()
    }
}

/// Per-group, per-section capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPermissions {
    pub can_view: bool,
    pub can_post: bool,
    pub can_create_thread: bool,
    pub can_delete_post: bool,
    pub can_delete_thread: bool,
    pub can_delete_section: bool,
}

impl SectionPermissions {
    pub const ALL: Self = Self {
        can_view: true,
        can_post: true,
        can_create_thread: true,
        can_delete_post: true,
        can_delete_thread: true,
        can_delete_section: true,
    };

    /// What the `moderate` privilege grants in every section.
    pub const MODERATOR: Self = Self {
        can_view: true,
        can_post: true,
        can_create_thread: true,
        can_delete_post: true,
        can_delete_thread: true,
        can_delete_section: false,
    };

    pub const fn union(self, other: Self) -> Self {
        Self {
            can_view: self.can_view || other.can_view,
            can_post: self.can_post || other.can_post,
            can_create_thread: self.can_create_thread || other.can_create_thread,
            can_delete_post: self.can_delete_post || other.can_delete_post,
            can_delete_thread: self.can_delete_thread || other.can_delete_thread,
            can_delete_section: self.can_delete_section || other.can_delete_section,
        }
    }
}
