//! Permission resolution for actions inside regions.

use crate::cell::CellPos;
use crate::flag::Flag;
use crate::index::IndexView;
use crate::region::{PlayerId, Profile, Region};
use crate::trust::TrustPermissions;

/// A player attempting an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub profile: Profile,
    /// Externally granted capability that skips every region rule.
    pub bypass: bool,
}

impl Actor {
    #[must_use]
    pub const fn new(profile: Profile, bypass: bool) -> Self {
        Self { profile, bypass }
    }

    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.profile.id
    }
}

/// Decide whether `actor` may perform `action` in `region`.
///
/// Evaluation order:
/// 1. unclaimed → allow
/// 2. owner → allow
/// 3. bypass → allow
/// 4. flag off → deny; the flag is a master switch no trust level overrides
/// 5. member whose trust level grants `action` → allow, otherwise deny
#[must_use]
pub fn can_act(
    region: Option<&Region>,
    actor: &Actor,
    action: Flag,
    trust: &TrustPermissions,
) -> bool {
    let Some(region) = region else {
        return true;
    };
    if region.is_owner(actor.id()) || actor.bypass {
        return true;
    }
    if !region.flag(action) {
        return false;
    }
    region
        .member(actor.id())
        .is_some_and(|m| trust.allows(m.level, action))
}

/// Player-versus-player combat is gated by the `pvp` flag alone.
#[must_use]
pub fn combat_allowed(region: Option<&Region>) -> bool {
    region.is_none_or(|r| r.flag(Flag::Pvp))
}

/// Environmental effects with no actor are gated by their flag alone.
#[must_use]
pub fn environment_allowed(region: Option<&Region>, flag: Flag) -> bool {
    region.is_none_or(|r| r.flag(flag))
}

/// How explosions treat claimed cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExplosionRule {
    /// A claimed cell is spared unless its region enables `explosions`.
    #[default]
    FlagGated,
    /// Every claimed cell is spared. Older behaviour, kept for servers that
    /// relied on it.
    Blanket,
}

/// Keep the cells of an explosion batch that may be affected. Each cell is
/// judged against its own region.
#[must_use]
pub fn filter_explosion(view: &IndexView<'_>, cells: Vec<CellPos>, rule: ExplosionRule) -> Vec<CellPos> {
    cells
        .into_iter()
        .filter(|cell| match view.lookup(cell) {
            None => true,
            Some(region) => match rule {
                ExplosionRule::FlagGated => region.flag(Flag::Explosions),
                ExplosionRule::Blanket => false,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::FlagValues;
    use crate::index::SpatialIndex;
    use crate::region::{Member, RegionId};
    use crate::trust::TrustLevel;
    use uuid::Uuid;

    fn profile(n: u128) -> Profile {
        Profile::new(PlayerId(Uuid::from_u128(n)), format!("p{n}"))
    }

    fn region() -> Region {
        Region::new(
            RegionId(1),
            profile(1),
            CellPos::new("w", 0, 0),
            FlagValues::default(),
        )
    }

    #[test]
    fn test_unclaimed_allows_everything() {
        let stranger = Actor::new(profile(5), false);
        for flag in Flag::ALL {
            assert!(can_act(None, &stranger, flag, &TrustPermissions::default()));
        }
    }

    #[test]
    fn test_owner_and_bypass_ignore_flags() {
        let mut region = region();
        region.set_flag(Flag::BlockBreak, false);
        let trust = TrustPermissions::default();

        assert!(can_act(Some(&region), &Actor::new(profile(1), false), Flag::BlockBreak, &trust));
        assert!(can_act(Some(&region), &Actor::new(profile(2), true), Flag::BlockBreak, &trust));
        assert!(!can_act(Some(&region), &Actor::new(profile(2), false), Flag::BlockBreak, &trust));
    }

    #[test]
    fn test_flag_off_denies_every_trust_level() {
        let mut region = region();
        region.upsert_member(Member::new(profile(2), TrustLevel::Admin));
        region.set_flag(Flag::DoorAccess, false);

        let admin = Actor::new(profile(2), false);
        assert!(!can_act(Some(&region), &admin, Flag::DoorAccess, &TrustPermissions::default()));
    }

    #[test]
    fn test_trust_level_gates_action_when_flag_on() {
        let mut region = region();
        for flag in Flag::ALL {
            region.set_flag(flag, true);
        }
        region.upsert_member(Member::new(profile(2), TrustLevel::Trusted));
        region.upsert_member(Member::new(profile(3), TrustLevel::Moderator));
        region.upsert_member(Member::new(profile(4), TrustLevel::Admin));
        let trust = TrustPermissions::default();
        let trusted = Actor::new(profile(2), false);
        let moderator = Actor::new(profile(3), false);
        let admin = Actor::new(profile(4), false);
        let stranger = Actor::new(profile(9), false);

        assert!(can_act(Some(&region), &trusted, Flag::BlockPlace, &trust));
        assert!(!can_act(Some(&region), &trusted, Flag::RedstoneAccess, &trust));
        assert!(can_act(Some(&region), &moderator, Flag::RedstoneAccess, &trust));
        assert!(!can_act(Some(&region), &moderator, Flag::AnimalDamage, &trust));
        assert!(can_act(Some(&region), &admin, Flag::AnimalDamage, &trust));
        assert!(!can_act(Some(&region), &stranger, Flag::BlockPlace, &trust));
    }

    #[test]
    fn test_moderator_superset_of_trusted() {
        let mut region = region();
        for flag in Flag::ALL {
            region.set_flag(flag, true);
        }
        region.upsert_member(Member::new(profile(2), TrustLevel::Trusted));
        region.upsert_member(Member::new(profile(3), TrustLevel::Moderator));
        let trust = TrustPermissions::default();

        for flag in Flag::ALL {
            if can_act(Some(&region), &Actor::new(profile(2), false), flag, &trust) {
                assert!(can_act(Some(&region), &Actor::new(profile(3), false), flag, &trust));
            }
        }
    }

    #[test]
    fn test_combat_follows_pvp_flag() {
        let mut region = region();
        assert!(combat_allowed(None));
        assert!(!combat_allowed(Some(&region)));

        region.set_flag(Flag::Pvp, true);
        assert!(combat_allowed(Some(&region)));
    }

    #[test]
    fn test_explosion_batch_filtering() {
        let index = SpatialIndex::new();
        index.write().insert(region()).unwrap();
        let mut open = Region::new(
            RegionId(2),
            profile(2),
            CellPos::new("w", 5, 5),
            FlagValues::default(),
        );
        open.set_flag(Flag::Explosions, true);
        index.write().insert(open).unwrap();

        let batch = vec![
            CellPos::new("w", 0, 0),
            CellPos::new("w", 5, 5),
            CellPos::new("w", 9, 9),
        ];

        let gated = filter_explosion(&index.read(), batch.clone(), ExplosionRule::FlagGated);
        assert_eq!(gated, vec![CellPos::new("w", 5, 5), CellPos::new("w", 9, 9)]);

        let blanket = filter_explosion(&index.read(), batch, ExplosionRule::Blanket);
        assert_eq!(blanket, vec![CellPos::new("w", 9, 9)]);
    }
}
