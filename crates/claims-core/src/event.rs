//! Protection intents delivered by the host, and their verdicts.

use crate::cell::CellPos;
use crate::flag::Flag;
use crate::permission::Actor;

/// What an interaction targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractTarget {
    Container,
    Door,
    Button,
    Lever,
    PressurePlate,
    Redstone,
    Entity,
}

impl InteractTarget {
    #[must_use]
    pub const fn flag(self) -> Flag {
        match self {
            Self::Container => Flag::ContainerAccess,
            Self::Door => Flag::DoorAccess,
            Self::Button => Flag::ButtonAccess,
            Self::Lever => Flag::LeverAccess,
            Self::PressurePlate => Flag::PressurePlateAccess,
            Self::Redstone => Flag::RedstoneAccess,
            Self::Entity => Flag::EntityInteract,
        }
    }
}

/// Effects that happen without a player behind them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Environment {
    FireSpread,
    LavaFlow,
    WaterFlow,
    MobSpawning,
    MobDamage,
}

impl Environment {
    #[must_use]
    pub const fn flag(self) -> Flag {
        match self {
            Self::FireSpread => Flag::FireSpread,
            Self::LavaFlow => Flag::LavaFlow,
            Self::WaterFlow => Flag::WaterFlow,
            Self::MobSpawning => Flag::MobSpawning,
            Self::MobDamage => Flag::MobDamage,
        }
    }
}

/// One protected world action.
#[derive(Clone, Debug, PartialEq)]
pub enum ProtectionEvent {
    Break { actor: Actor, cell: CellPos },
    Place { actor: Actor, cell: CellPos },
    Interact { actor: Actor, cell: CellPos, target: InteractTarget },
    /// A player attacking another player standing in `cell`.
    Combat { cell: CellPos },
    AnimalDamage { actor: Actor, cell: CellPos },
    ItemPickup { actor: Actor, cell: CellPos },
    /// Every cell an explosion would affect.
    Explosion { cells: Vec<CellPos> },
    Environment { cell: CellPos, effect: Environment },
}

impl ProtectionEvent {
    /// Flag consulted for this event. Explosions are judged per cell and
    /// report [`Flag::Explosions`].
    #[must_use]
    pub const fn flag(&self) -> Flag {
        match self {
            Self::Break { .. } => Flag::BlockBreak,
            Self::Place { .. } => Flag::BlockPlace,
            Self::Interact { target, .. } => target.flag(),
            Self::Combat { .. } => Flag::Pvp,
            Self::AnimalDamage { .. } => Flag::AnimalDamage,
            Self::ItemPickup { .. } => Flag::ItemPickup,
            Self::Explosion { .. } => Flag::Explosions,
            Self::Environment { effect, .. } => effect.flag(),
        }
    }
}

/// Answer to a [`ProtectionEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
    /// Explosion cells that may still be affected.
    Filtered(Vec<CellPos>),
}

impl Verdict {
    #[must_use]
    pub const fn from_bool(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }

    /// False only for [`Verdict::Deny`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, Self::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interact_targets_map_to_distinct_flags() {
        let targets = [
            InteractTarget::Container,
            InteractTarget::Door,
            InteractTarget::Button,
            InteractTarget::Lever,
            InteractTarget::PressurePlate,
            InteractTarget::Redstone,
            InteractTarget::Entity,
        ];
        let flags: hashbrown::HashSet<Flag> = targets.iter().map(|t| t.flag()).collect();
        assert_eq!(flags.len(), targets.len());
    }

    #[test]
    fn test_verdict_from_bool() {
        assert_eq!(Verdict::from_bool(true), Verdict::Allow);
        assert!(!Verdict::from_bool(false).is_allowed());
        assert!(Verdict::Filtered(Vec::new()).is_allowed());
    }
}
