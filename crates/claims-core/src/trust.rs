//! Trust levels and the permission sets they grant.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClaimError;
use crate::flag::{Flag, FlagSet};

/// Graded trust a region owner grants to another player.
///
/// Levels are strictly ordered and each one can do everything the previous
/// one can.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Trusted,
    Moderator,
    Admin,
}

impl TrustLevel {
    pub const ALL: [Self; 3] = [Self::Trusted, Self::Moderator, Self::Admin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// Next level in the trusted → moderator → admin → trusted cycle.
    #[must_use]
    pub const fn cycle(self) -> Self {
        match self {
            Self::Trusted => Self::Moderator,
            Self::Moderator => Self::Admin,
            Self::Admin => Self::Trusted,
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trusted" => Ok(Self::Trusted),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            _ => Err(ClaimError::InvalidTrustLevel(s.to_owned())),
        }
    }
}

/// Effective permission set of every trust level.
///
/// Construction folds lower levels into higher ones, so the superset ordering
/// holds whatever the input lists contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrustPermissions {
    levels: [FlagSet; 3],
}

impl TrustPermissions {
    #[must_use]
    pub fn new(trusted: FlagSet, moderator: FlagSet, admin: FlagSet) -> Self {
        let moderator = moderator | trusted;
        let admin = admin | moderator;
        Self {
            levels: [trusted, moderator, admin],
        }
    }

    #[must_use]
    pub const fn of(&self, level: TrustLevel) -> FlagSet {
        self.levels[level as usize]
    }

    #[must_use]
    pub const fn allows(&self, level: TrustLevel, action: Flag) -> bool {
        self.of(level).has(action)
    }
}

impl Default for TrustPermissions {
    fn default() -> Self {
        Self::new(
            FlagSet::BLOCK_BREAK
                | FlagSet::BLOCK_PLACE
                | FlagSet::CONTAINER_ACCESS
                | FlagSet::DOOR_ACCESS
                | FlagSet::BUTTON_ACCESS
                | FlagSet::LEVER_ACCESS
                | FlagSet::ITEM_PICKUP,
            FlagSet::PRESSURE_PLATE_ACCESS | FlagSet::REDSTONE_ACCESS | FlagSet::ENTITY_INTERACT,
            FlagSet::ANIMAL_DAMAGE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(TrustLevel::Trusted < TrustLevel::Moderator);
        assert!(TrustLevel::Moderator < TrustLevel::Admin);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Moderator".parse::<TrustLevel>().unwrap(), TrustLevel::Moderator);
        assert_eq!(TrustLevel::Admin.to_string(), "admin");
        assert!(matches!(
            "owner".parse::<TrustLevel>(),
            Err(ClaimError::InvalidTrustLevel(_))
        ));
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(TrustLevel::Trusted.cycle(), TrustLevel::Moderator);
        assert_eq!(TrustLevel::Admin.cycle(), TrustLevel::Trusted);
    }

    #[test]
    fn test_default_sets_are_cumulative() {
        let perms = TrustPermissions::default();

        for flag in Flag::ALL {
            if perms.allows(TrustLevel::Trusted, flag) {
                assert!(perms.allows(TrustLevel::Moderator, flag));
            }
            if perms.allows(TrustLevel::Moderator, flag) {
                assert!(perms.allows(TrustLevel::Admin, flag));
            }
        }

        assert!(perms.allows(TrustLevel::Trusted, Flag::BlockBreak));
        assert!(!perms.allows(TrustLevel::Trusted, Flag::RedstoneAccess));
        assert!(perms.allows(TrustLevel::Moderator, Flag::RedstoneAccess));
        assert!(!perms.allows(TrustLevel::Moderator, Flag::AnimalDamage));
        assert!(perms.allows(TrustLevel::Admin, Flag::AnimalDamage));
    }

    #[test]
    fn test_sparse_config_still_cumulative() {
        let perms = TrustPermissions::new(FlagSet::DOOR_ACCESS, FlagSet::empty(), FlagSet::PVP);

        assert!(perms.allows(TrustLevel::Moderator, Flag::DoorAccess));
        assert!(perms.allows(TrustLevel::Admin, Flag::DoorAccess));
        assert!(!perms.allows(TrustLevel::Moderator, Flag::Pvp));
    }
}
