//! Protection flag registry.
//!
//! The registry is a fixed table built at compile time: every [`Flag`] has a
//! kebab-case key, a display name, a description, and a default value. A
//! region that never set a flag reads the registry default.

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A named boolean protection toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Flag {
    Pvp,
    MobSpawning,
    MobDamage,
    Explosions,
    FireSpread,
    LavaFlow,
    WaterFlow,
    ItemPickup,
    BlockBreak,
    BlockPlace,
    ContainerAccess,
    DoorAccess,
    ButtonAccess,
    LeverAccess,
    PressurePlateAccess,
    RedstoneAccess,
    EntityInteract,
    AnimalDamage,
}

/// Registry metadata for one flag.
#[derive(Debug)]
pub struct FlagInfo {
    pub flag: Flag,
    pub key: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub default: bool,
}

const fn info(
    flag: Flag,
    key: &'static str,
    display_name: &'static str,
    description: &'static str,
    default: bool,
) -> FlagInfo {
    FlagInfo {
        flag,
        key,
        display_name,
        description,
        default,
    }
}

// Indexed by `Flag as usize`; order must match the enum.
static REGISTRY: [FlagInfo; Flag::COUNT] = [
    info(Flag::Pvp, "pvp", "PvP", "Allow player vs player combat", false),
    info(Flag::MobSpawning, "mob-spawning", "Mob Spawning", "Allow mobs to spawn", true),
    info(Flag::MobDamage, "mob-damage", "Mob Damage", "Allow mobs to take damage", true),
    info(Flag::Explosions, "explosions", "Explosions", "Allow explosions", false),
    info(Flag::FireSpread, "fire-spread", "Fire Spread", "Allow fire to spread", false),
    info(Flag::LavaFlow, "lava-flow", "Lava Flow", "Allow lava to flow", false),
    info(Flag::WaterFlow, "water-flow", "Water Flow", "Allow water to flow", true),
    info(
        Flag::ItemPickup,
        "item-pickup",
        "Item Pickup",
        "Allow non-trusted players to pick up items",
        false,
    ),
    info(
        Flag::BlockBreak,
        "block-break",
        "Block Break",
        "Allow non-trusted players to break blocks",
        false,
    ),
    info(
        Flag::BlockPlace,
        "block-place",
        "Block Place",
        "Allow non-trusted players to place blocks",
        false,
    ),
    info(
        Flag::ContainerAccess,
        "container-access",
        "Container Access",
        "Allow non-trusted players to access containers",
        false,
    ),
    info(
        Flag::DoorAccess,
        "door-access",
        "Door Access",
        "Allow non-trusted players to use doors",
        false,
    ),
    info(
        Flag::ButtonAccess,
        "button-access",
        "Button Access",
        "Allow non-trusted players to use buttons",
        false,
    ),
    info(
        Flag::LeverAccess,
        "lever-access",
        "Lever Access",
        "Allow non-trusted players to use levers",
        false,
    ),
    info(
        Flag::PressurePlateAccess,
        "pressure-plate-access",
        "Pressure Plate Access",
        "Allow non-trusted players to use pressure plates",
        false,
    ),
    info(
        Flag::RedstoneAccess,
        "redstone-access",
        "Redstone Access",
        "Allow non-trusted players to interact with redstone",
        false,
    ),
    info(
        Flag::EntityInteract,
        "entity-interact",
        "Entity Interact",
        "Allow non-trusted players to interact with entities",
        false,
    ),
    info(
        Flag::AnimalDamage,
        "animal-damage",
        "Animal Damage",
        "Allow non-trusted players to damage animals",
        false,
    ),
];

impl Flag {
    pub const COUNT: usize = 18;

    /// All flags in registry order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Pvp,
        Self::MobSpawning,
        Self::MobDamage,
        Self::Explosions,
        Self::FireSpread,
        Self::LavaFlow,
        Self::WaterFlow,
        Self::ItemPickup,
        Self::BlockBreak,
        Self::BlockPlace,
        Self::ContainerAccess,
        Self::DoorAccess,
        Self::ButtonAccess,
        Self::LeverAccess,
        Self::PressurePlateAccess,
        Self::RedstoneAccess,
        Self::EntityInteract,
        Self::AnimalDamage,
    ];

    #[must_use]
    pub fn info(self) -> &'static FlagInfo {
        &REGISTRY[self as usize]
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        self.info().key
    }

    #[must_use]
    pub fn default_value(self) -> bool {
        self.info().default
    }

    /// Single-bit set for this flag.
    #[must_use]
    pub const fn bit(self) -> FlagSet {
        FlagSet::from_bits_retain(1 << self as u32)
    }

    /// Parse a flag key. Accepts `block-break`, `block_break` and `BLOCK_BREAK`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized = key.trim().to_ascii_lowercase().replace('_', "-");
        REGISTRY
            .iter()
            .find(|info| info.key == normalized)
            .map(|info| info.flag)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The whole registry, in [`Flag::ALL`] order.
#[must_use]
pub fn registry() -> &'static [FlagInfo] {
    &REGISTRY
}

bitflags! {
    /// A set of flags, one bit per [`Flag`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FlagSet: u32 {
        const PVP = 1 << 0;
        const MOB_SPAWNING = 1 << 1;
        const MOB_DAMAGE = 1 << 2;
        const EXPLOSIONS = 1 << 3;
        const FIRE_SPREAD = 1 << 4;
        const LAVA_FLOW = 1 << 5;
        const WATER_FLOW = 1 << 6;
        const ITEM_PICKUP = 1 << 7;
        const BLOCK_BREAK = 1 << 8;
        const BLOCK_PLACE = 1 << 9;
        const CONTAINER_ACCESS = 1 << 10;
        const DOOR_ACCESS = 1 << 11;
        const BUTTON_ACCESS = 1 << 12;
        const LEVER_ACCESS = 1 << 13;
        const PRESSURE_PLATE_ACCESS = 1 << 14;
        const REDSTONE_ACCESS = 1 << 15;
        const ENTITY_INTERACT = 1 << 16;
        const ANIMAL_DAMAGE = 1 << 17;
    }
}

impl FlagSet {
    #[must_use]
    pub const fn has(self, flag: Flag) -> bool {
        self.contains(flag.bit())
    }

    /// Flags in this set, in registry order.
    pub fn flags(self) -> impl Iterator<Item = Flag> {
        Flag::ALL.into_iter().filter(move |f| self.has(*f))
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, f| set | f.bit())
    }
}

/// Flag values of one region.
///
/// Only explicitly set flags are stored; everything else reads the registry
/// default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FlagValues {
    explicit: FlagSet,
    enabled: FlagSet,
}

impl FlagValues {
    #[must_use]
    pub fn get(&self, flag: Flag) -> bool {
        if self.explicit.has(flag) {
            self.enabled.has(flag)
        } else {
            flag.default_value()
        }
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        self.explicit.insert(flag.bit());
        self.enabled.set(flag.bit(), value);
    }

    /// Forget an explicit value so the flag reads its default again.
    pub fn reset(&mut self, flag: Flag) {
        self.explicit.remove(flag.bit());
        self.enabled.remove(flag.bit());
    }

    #[must_use]
    pub fn is_explicit(&self, flag: Flag) -> bool {
        self.explicit.has(flag)
    }

    /// Explicitly set flags with their values, in registry order.
    pub fn explicit(&self) -> impl Iterator<Item = (Flag, bool)> + '_ {
        self.explicit.flags().map(|f| (f, self.enabled.has(f)))
    }

    /// Every flag with its effective value, in registry order.
    pub fn effective(&self) -> impl Iterator<Item = (Flag, bool)> + '_ {
        Flag::ALL.into_iter().map(|f| (f, self.get(f)))
    }
}

impl FromIterator<(Flag, bool)> for FlagValues {
    fn from_iter<I: IntoIterator<Item = (Flag, bool)>>(iter: I) -> Self {
        let mut values = Self::default();
        for (flag, value) in iter {
            values.set(flag, value);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_matches_enum() {
        for (i, flag) in Flag::ALL.iter().enumerate() {
            assert_eq!(registry()[i].flag, *flag);
            assert_eq!(*flag as usize, i);
        }
    }

    #[test]
    fn test_bits_match_named_constants() {
        assert_eq!(Flag::Pvp.bit(), FlagSet::PVP);
        assert_eq!(Flag::BlockBreak.bit(), FlagSet::BLOCK_BREAK);
        assert_eq!(Flag::AnimalDamage.bit(), FlagSet::ANIMAL_DAMAGE);
        assert_eq!(Flag::ALL.into_iter().collect::<FlagSet>(), FlagSet::all());
    }

    #[test]
    fn test_from_key_variants() {
        assert_eq!(Flag::from_key("block-break"), Some(Flag::BlockBreak));
        assert_eq!(Flag::from_key("BLOCK_BREAK"), Some(Flag::BlockBreak));
        assert_eq!(Flag::from_key("pressure_plate-access"), Some(Flag::PressurePlateAccess));
        assert_eq!(Flag::from_key("flight"), None);
    }

    #[test]
    fn test_unset_flag_reads_default() {
        let mut values = FlagValues::default();
        for flag in Flag::ALL {
            assert_eq!(values.get(flag), flag.default_value());
        }

        values.set(Flag::Pvp, true);
        values.set(Flag::WaterFlow, false);
        assert!(values.get(Flag::Pvp));
        assert!(!values.get(Flag::WaterFlow));

        values.reset(Flag::Pvp);
        assert!(!values.get(Flag::Pvp));
        assert!(!values.is_explicit(Flag::Pvp));
    }

    #[test]
    fn test_explicit_iteration() {
        let values: FlagValues = [(Flag::Explosions, true), (Flag::Pvp, false)]
            .into_iter()
            .collect();

        let explicit: Vec<_> = values.explicit().collect();
        assert_eq!(explicit, vec![(Flag::Pvp, false), (Flag::Explosions, true)]);
        assert_eq!(values.effective().count(), Flag::COUNT);
    }
}
