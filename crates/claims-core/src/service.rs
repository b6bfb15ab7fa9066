//! The claim service: queries, mutations and persistence dispatch over one
//! shared [`SpatialIndex`].
//!
//! Mutations update the index and hand the new region snapshot to the
//! [`RegionSink`] under one write lock, so the sink sees writes in index
//! order. Waiting for the write to finish happens after the lock is
//! released. A failed write is logged and reported, but the in-memory
//! change stands.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, error, info, warn};

use crate::cell::CellPos;
use crate::config::ClaimsConfig;
use crate::error::{ClaimError, ClaimResult, Missing, PersistError};
use crate::event::{ProtectionEvent, Verdict};
use crate::flag::{Flag, FlagValues};
use crate::growth::{self, ClaimOutcome, GrowthPolicy, Seed};
use crate::index::{IndexTxn, ReplaceReport, SpatialIndex, Unbound};
use crate::permission::{self, Actor};
use crate::provider::{
    CoordinateProvider, IdentityProvider, LoadedRegions, Position, Receipt, RegionSink,
    RegionSource,
};
use crate::region::{Member, PlayerId, Profile, Region, RegionId};
use crate::trust::{TrustLevel, TrustPermissions};

/// Aggregate counts over every region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClaimStats {
    pub regions: usize,
    pub cells: usize,
    pub members: usize,
    pub owners: usize,
}

pub struct ClaimService {
    config: ClaimsConfig,
    policy: GrowthPolicy,
    flag_defaults: FlagValues,
    trust: TrustPermissions,
    index: SpatialIndex,
    loaded: AtomicBool,
    next_id: AtomicU64,
    sink: Arc<dyn RegionSink>,
}

impl ClaimService {
    /// Build a service in the loading state. Fails on unknown flag keys in
    /// `config`.
    pub fn new(config: ClaimsConfig, sink: Arc<dyn RegionSink>) -> ClaimResult<Self> {
        let flag_defaults = config.flag_defaults()?;
        let trust = config.trust_permissions()?;
        Ok(Self {
            policy: config.growth_policy(),
            config,
            flag_defaults,
            trust,
            index: SpatialIndex::new(),
            loaded: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            sink,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ClaimsConfig {
        &self.config
    }

    #[must_use]
    pub const fn trust_permissions(&self) -> &TrustPermissions {
        &self.trust
    }

    /// False until the first load completes. Until then queries see no
    /// regions and mutations fail with [`ClaimError::Loading`].
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Read every region from `source` and replace the index with them.
    ///
    /// Mutations fail with [`ClaimError::Loading`] until the new index is
    /// installed. Writes accepted before that are flushed before `source` is
    /// read. If the read fails the previous index stays in service.
    pub fn load_from(&self, source: &dyn RegionSource) -> ClaimResult<ReplaceReport> {
        let was_loaded = self.suspend();
        match self.sink.flush().and_then(|()| source.load_all()) {
            Ok(loaded) => Ok(self.finish_load(loaded)),
            Err(err) => {
                if was_loaded {
                    self.loaded.store(true, Ordering::Release);
                }
                error!(%err, "failed to load claims");
                Err(err.into())
            }
        }
    }

    /// Stop accepting mutations. Returns whether the service was loaded.
    fn suspend(&self) -> bool {
        let _txn = self.index.write();
        self.loaded.swap(false, Ordering::AcqRel)
    }

    /// Same as [`Self::load_from`]; the index is replaced, never merged.
    pub fn reload(&self, source: &dyn RegionSource) -> ClaimResult<ReplaceReport> {
        let report = self.load_from(source)?;
        info!(regions = report.regions, "reloaded claims");
        Ok(report)
    }

    /// Install regions that were loaded elsewhere.
    pub fn finish_load(&self, loaded: LoadedRegions) -> ReplaceReport {
        let max_loaded = loaded.regions.iter().map(|r| r.id().0).max().unwrap_or(0);
        let next = loaded.next_id.max(max_loaded + 1).max(1);

        let report = self.index.replace_all(loaded.regions);
        self.next_id.fetch_max(next, Ordering::AcqRel);
        self.loaded.store(true, Ordering::Release);

        if report.conflicts > 0 || report.empty > 0 {
            warn!(
                conflicts = report.conflicts,
                empty = report.empty,
                "dropped inconsistent rows while loading"
            );
        }
        info!(
            regions = report.regions,
            cells = report.cells,
            next_id = next,
            "claims loaded"
        );
        report
    }

    /// Take the write lock for a mutation.
    fn begin(&self) -> ClaimResult<IndexTxn<'_>> {
        let txn = self.index.write();
        if self.is_loaded() {
            Ok(txn)
        } else {
            Err(ClaimError::Loading)
        }
    }

    fn allocate_id(&self) -> RegionId {
        RegionId(self.next_id.fetch_add(1, Ordering::AcqRel))
    }

    // Queries

    #[must_use]
    pub fn region_at(&self, cell: &CellPos) -> Option<Arc<Region>> {
        self.index.lookup(cell)
    }

    #[must_use]
    pub fn is_claimed(&self, cell: &CellPos) -> bool {
        self.index.is_claimed(cell)
    }

    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<Arc<Region>> {
        self.index.by_id(id)
    }

    /// Regions of `owner` in creation order.
    #[must_use]
    pub fn regions_of(&self, owner: PlayerId) -> Vec<Arc<Region>> {
        self.index.regions_of(owner)
    }

    #[must_use]
    pub fn all_regions(&self) -> Vec<Arc<Region>> {
        self.index.all()
    }

    /// Regions whose owner was last seen as `name`, ignoring case.
    #[must_use]
    pub fn regions_by_owner_name(&self, name: &str) -> Vec<Arc<Region>> {
        self.index
            .all()
            .into_iter()
            .filter(|r| r.owner().name.eq_ignore_ascii_case(name))
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> ClaimStats {
        let regions = self.index.all();
        ClaimStats {
            regions: regions.len(),
            cells: regions.iter().map(|r| r.cell_count()).sum(),
            members: regions.iter().map(|r| r.member_count()).sum(),
            owners: self.index.owner_count(),
        }
    }

    /// Whether `actor` may perform `action` in `cell`.
    #[must_use]
    pub fn can_act(&self, actor: &Actor, cell: &CellPos, action: Flag) -> bool {
        let view = self.index.read();
        permission::can_act(view.lookup(cell), actor, action, &self.trust)
    }

    /// Answer one protection event.
    #[must_use]
    pub fn handle(&self, event: &ProtectionEvent) -> Verdict {
        let switches = &self.config.protection;
        let view = self.index.read();

        match event {
            ProtectionEvent::Break { .. } if !switches.block_break => Verdict::Allow,
            ProtectionEvent::Place { .. } if !switches.block_place => Verdict::Allow,
            ProtectionEvent::Interact { .. } if !switches.interact => Verdict::Allow,
            ProtectionEvent::Break { actor, cell }
            | ProtectionEvent::Place { actor, cell }
            | ProtectionEvent::Interact { actor, cell, .. }
            | ProtectionEvent::AnimalDamage { actor, cell }
            | ProtectionEvent::ItemPickup { actor, cell } => Verdict::from_bool(
                permission::can_act(view.lookup(cell), actor, event.flag(), &self.trust),
            ),
            ProtectionEvent::Combat { cell } => {
                Verdict::from_bool(permission::combat_allowed(view.lookup(cell)))
            }
            ProtectionEvent::Environment { cell, effect } => Verdict::from_bool(
                permission::environment_allowed(view.lookup(cell), effect.flag()),
            ),
            ProtectionEvent::Explosion { cells } if !switches.explosion => {
                Verdict::Filtered(cells.clone())
            }
            ProtectionEvent::Explosion { cells } => Verdict::Filtered(permission::filter_explosion(
                &view,
                cells.clone(),
                switches.explosion_rule(),
            )),
        }
    }

    /// Build an [`Actor`] with the bypass capability resolved.
    #[must_use]
    pub fn actor(identity: &dyn IdentityProvider, profile: Profile) -> Actor {
        let bypass = identity.has_bypass(profile.id);
        Actor::new(profile, bypass)
    }

    /// Where to send a player visiting region `id`.
    #[must_use]
    pub fn teleport_target(&self, id: RegionId, coords: &dyn CoordinateProvider) -> Option<Position> {
        let region = self.index.by_id(id)?;
        let cell = region.sorted_cells().into_iter().next()?;
        Some(coords.safe_position(&cell))
    }

    // Mutations

    /// Claim `cell` for the actor, creating or growing a region.
    pub fn claim(&self, actor: &Actor, cell: CellPos) -> ClaimResult<ClaimOutcome> {
        let (outcome, staged) = {
            let mut txn = self.begin()?;
            let outcome = growth::claim(
                &mut txn,
                &self.policy,
                cell,
                Seed {
                    owner: actor.profile.clone(),
                    flags: self.flag_defaults,
                    allocate: || self.allocate_id(),
                },
            )?;
            let staged = self.sink.save(Arc::clone(outcome.region()));
            (outcome, staged)
        };

        let region = outcome.region();
        info!(
            region = %region.id(),
            owner = %region.owner().name,
            cells = region.cell_count(),
            "claimed cell"
        );
        settle(staged, region.id())?;
        Ok(outcome)
    }

    /// Grow the region the actor stands in (`at`) by `cell`.
    pub fn expand(&self, actor: &Actor, at: &CellPos, cell: CellPos) -> ClaimResult<Arc<Region>> {
        let (region, staged) = {
            let mut txn = self.begin()?;
            let target = txn.lookup(at).ok_or(ClaimError::NotFound(Missing::Region))?;
            authorize(target, actor)?;
            let id = target.id();
            let region = growth::expand(&mut txn, &self.policy, id, cell)?;
            let staged = self.sink.save(Arc::clone(&region));
            (region, staged)
        };

        info!(region = %region.id(), cells = region.cell_count(), "expanded region");
        settle(staged, region.id())?;
        Ok(region)
    }

    /// Remove one cell from the region holding it. The region is deleted
    /// with its last cell.
    pub fn unclaim(&self, actor: &Actor, cell: &CellPos) -> ClaimResult<Unbound> {
        let (unbound, staged) = {
            let mut txn = self.begin()?;
            let region = txn.lookup(cell).ok_or(ClaimError::NotClaimed)?;
            authorize(region, actor)?;
            let unbound = growth::remove(&mut txn, cell)?;
            let staged = match &unbound {
                Unbound::Shrunk(region) => self.sink.save(Arc::clone(region)),
                Unbound::Removed(region) => self.sink.delete(region.id()),
            };
            (unbound, staged)
        };

        let region = unbound.region();
        match &unbound {
            Unbound::Shrunk(_) => info!(region = %region.id(), %cell, "unclaimed cell"),
            Unbound::Removed(_) => {
                info!(region = %region.id(), %cell, "unclaimed last cell, region removed");
            }
        }
        settle(staged, region.id())?;
        Ok(unbound)
    }

    /// Delete a region with all of its cells, members and flags.
    pub fn delete(&self, actor: &Actor, id: RegionId) -> ClaimResult<Arc<Region>> {
        let (removed, staged) = {
            let mut txn = self.begin()?;
            let region = txn.by_id(id).ok_or(ClaimError::NotFound(Missing::Region))?;
            authorize(region, actor)?;
            let removed = txn.remove(id).ok_or(ClaimError::NotFound(Missing::Region))?;
            (removed, self.sink.delete(id))
        };

        info!(region = %id, cells = removed.cell_count(), "deleted region");
        settle(staged, id)?;
        Ok(removed)
    }

    /// Add `player` at `level`, or change the level of an existing member.
    pub fn trust(
        &self,
        actor: &Actor,
        id: RegionId,
        player: Profile,
        level: TrustLevel,
    ) -> ClaimResult<Arc<Region>> {
        let (region, ()) = self.edit(actor, id, |region| {
            let member = match region.member(player.id) {
                Some(existing) => Member {
                    player,
                    level,
                    added_at: existing.added_at,
                },
                None => Member::new(player, level),
            };
            debug!(region = %region.id(), member = %member.player.name, %level, "trusted player");
            region.upsert_member(member);
            Ok(())
        })?;
        Ok(region)
    }

    /// [`Self::trust`] with the player looked up among online players.
    pub fn trust_by_name(
        &self,
        actor: &Actor,
        id: RegionId,
        name: &str,
        level: TrustLevel,
        identity: &dyn IdentityProvider,
    ) -> ClaimResult<Arc<Region>> {
        let player = identity
            .find_online(name)
            .ok_or_else(|| ClaimError::UnknownPlayer(name.to_owned()))?;
        self.trust(actor, id, player, level)
    }

    pub fn untrust(&self, actor: &Actor, id: RegionId, player: PlayerId) -> ClaimResult<Member> {
        let (_, removed) = self.edit(actor, id, |region| {
            region
                .remove_member(player)
                .ok_or(ClaimError::NotFound(Missing::Member))
        })?;
        debug!(region = %id, member = %removed.player.name, "untrusted player");
        Ok(removed)
    }

    /// Advance a member to the next trust level, wrapping admin back to trusted.
    pub fn cycle_trust(&self, actor: &Actor, id: RegionId, player: PlayerId) -> ClaimResult<TrustLevel> {
        let (_, level) = self.edit(actor, id, |region| {
            let mut member = region
                .member(player)
                .cloned()
                .ok_or(ClaimError::NotFound(Missing::Member))?;
            member.level = member.level.cycle();
            let level = member.level;
            region.upsert_member(member);
            Ok(level)
        })?;
        Ok(level)
    }

    pub fn set_flag(&self, actor: &Actor, id: RegionId, flag: Flag, value: bool) -> ClaimResult<Arc<Region>> {
        let (region, ()) = self.edit(actor, id, |region| {
            region.set_flag(flag, value);
            Ok(())
        })?;
        debug!(region = %id, %flag, value, "set flag");
        Ok(region)
    }

    /// [`Self::set_flag`] with the flag given by key.
    pub fn set_flag_key(&self, actor: &Actor, id: RegionId, key: &str, value: bool) -> ClaimResult<Arc<Region>> {
        let flag = Flag::from_key(key).ok_or_else(|| ClaimError::InvalidFlag(key.to_owned()))?;
        self.set_flag(actor, id, flag, value)
    }

    /// Set the custom name; `None` or a blank name restores the default.
    pub fn rename(&self, actor: &Actor, id: RegionId, name: Option<String>) -> ClaimResult<Arc<Region>> {
        let (region, ()) = self.edit(actor, id, |region| {
            region.set_name(name);
            Ok(())
        })?;
        debug!(region = %id, name = %region.display_name(), "renamed region");
        Ok(region)
    }

    /// Hand a snapshot of every region to the sink. Returns how many were
    /// written.
    ///
    /// Snapshots are handed over under the read lock, so a region deleted
    /// afterwards is deleted after its last save.
    pub fn save_all(&self) -> usize {
        let staged: Vec<_> = {
            let view = self.index.read();
            if !self.is_loaded() {
                return 0;
            }
            view.regions()
                .into_iter()
                .map(|region| (region.id(), self.sink.save(Arc::clone(region))))
                .collect()
        };

        let total = staged.len();
        let mut saved = 0;
        for (id, staged) in staged {
            match staged.and_then(Receipt::wait) {
                Ok(()) => saved += 1,
                Err(err) => error!(region = %id, %err, "failed to save region"),
            }
        }
        debug!(saved, total, "saved all regions");
        saved
    }

    /// Run `f` on region `id` as `actor`, then persist the result.
    fn edit<R>(
        &self,
        actor: &Actor,
        id: RegionId,
        f: impl FnOnce(&mut Region) -> ClaimResult<R>,
    ) -> ClaimResult<(Arc<Region>, R)> {
        let (region, out, staged) = {
            let mut txn = self.begin()?;
            let current = txn.by_id(id).ok_or(ClaimError::NotFound(Missing::Region))?;
            authorize(current, actor)?;
            let (region, out) = txn
                .update(id, |region| -> ClaimResult<R> {
                    let out = f(region)?;
                    region.touch();
                    Ok(out)
                })
                .ok_or(ClaimError::NotFound(Missing::Region))?;
            let out = out?;
            let staged = self.sink.save(Arc::clone(&region));
            (region, out, staged)
        };
        settle(staged, id)?;
        Ok((region, out))
    }
}

/// Wait for a write handed to the sink under the lock.
fn settle(staged: Result<Receipt, PersistError>, id: RegionId) -> ClaimResult<()> {
    staged.and_then(Receipt::wait).map_err(|err| {
        error!(region = %id, %err, "failed to persist region");
        ClaimError::from(err)
    })
}

fn authorize(region: &Region, actor: &Actor) -> ClaimResult<()> {
    if region.is_owner(actor.id()) || actor.bypass {
        Ok(())
    } else {
        Err(ClaimError::NotOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Quota;
    use crate::event::{Environment, InteractTarget};
    use crate::provider::{GridCoordinates, NullSink};
    use parking_lot::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<RegionId>>,
        deleted: Mutex<Vec<RegionId>>,
        flushes: AtomicU64,
        fail: AtomicBool,
    }

    impl RegionSink for RecordingSink {
        fn save(&self, region: Arc<Region>) -> Result<Receipt, PersistError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(PersistError::new("disk full"));
            }
            self.saved.lock().push(region.id());
            Ok(Receipt::done())
        }

        fn delete(&self, id: RegionId) -> Result<Receipt, PersistError> {
            self.deleted.lock().push(id);
            Ok(Receipt::done())
        }

        fn flush(&self) -> Result<(), PersistError> {
            self.flushes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Source that tries to claim a cell while it is being read.
    struct Meddling<'a> {
        service: &'a ClaimService,
        attempt: Mutex<Option<ClaimResult<ClaimOutcome>>>,
    }

    impl RegionSource for Meddling<'_> {
        fn load_all(&self) -> Result<LoadedRegions, PersistError> {
            let result = self.service.claim(&actor(2), cell(7, 7));
            *self.attempt.lock() = Some(result);
            Ok(LoadedRegions::default())
        }
    }

    struct Broken;

    impl RegionSource for Broken {
        fn load_all(&self) -> Result<LoadedRegions, PersistError> {
            Err(PersistError::new("unreadable"))
        }
    }

    struct Fixed(LoadedRegions);

    impl RegionSource for Fixed {
        fn load_all(&self) -> Result<LoadedRegions, PersistError> {
            Ok(LoadedRegions {
                regions: self.0.regions.clone(),
                next_id: self.0.next_id,
            })
        }
    }

    fn actor(n: u128) -> Actor {
        Actor::new(
            Profile::new(PlayerId(Uuid::from_u128(n)), format!("player{n}")),
            false,
        )
    }

    fn cell(x: i32, z: i32) -> CellPos {
        CellPos::new("world", x, z)
    }

    fn loaded(sink: Arc<dyn RegionSink>) -> ClaimService {
        let service = ClaimService::new(ClaimsConfig::default(), sink).unwrap();
        service.finish_load(LoadedRegions::default());
        service
    }

    #[test]
    fn test_loading_state_fails_open_and_rejects_mutations() {
        let service = ClaimService::new(ClaimsConfig::default(), Arc::new(NullSink)).unwrap();

        assert!(!service.is_loaded());
        assert!(service.region_at(&cell(0, 0)).is_none());
        assert!(service.can_act(&actor(1), &cell(0, 0), Flag::BlockBreak));
        assert_eq!(
            service.claim(&actor(1), cell(0, 0)).unwrap_err(),
            ClaimError::Loading
        );
    }

    #[test]
    fn test_claim_persists_and_assigns_ids_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let service = loaded(sink.clone());

        let a = service.claim(&actor(1), cell(0, 0)).unwrap();
        let b = service.claim(&actor(2), cell(9, 9)).unwrap();

        assert_eq!(a.region().id(), RegionId(1));
        assert_eq!(b.region().id(), RegionId(2));
        assert_eq!(*sink.saved.lock(), vec![RegionId(1), RegionId(2)]);
    }

    #[test]
    fn test_load_seeds_id_counter_past_loaded_ids() {
        let service = ClaimService::new(ClaimsConfig::default(), Arc::new(NullSink)).unwrap();
        let existing = Region::new(
            RegionId(41),
            actor(1).profile,
            cell(0, 0),
            FlagValues::default(),
        );
        let source = Fixed(LoadedRegions {
            regions: vec![existing],
            next_id: 7,
        });

        service.load_from(&source).unwrap();
        let created = service.claim(&actor(2), cell(5, 5)).unwrap();

        assert_eq!(created.region().id(), RegionId(42));
    }

    #[test]
    fn test_mutation_during_reload_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let service = loaded(sink.clone());
        service.claim(&actor(1), cell(0, 0)).unwrap();

        let source = Meddling {
            service: &service,
            attempt: Mutex::new(None),
        };
        service.reload(&source).unwrap();

        assert_eq!(
            source.attempt.lock().take().map(|r| r.map(|o| o.region().id())),
            Some(Err(ClaimError::Loading))
        );
        assert!(!service.is_claimed(&cell(7, 7)));
        assert_eq!(sink.saved.lock().len(), 1);
        assert_eq!(sink.flushes.load(Ordering::Relaxed), 1);
        assert!(service.is_loaded());
    }

    #[test]
    fn test_failed_reload_keeps_serving() {
        let service = loaded(Arc::new(NullSink));
        service.claim(&actor(1), cell(0, 0)).unwrap();

        assert!(matches!(
            service.reload(&Broken).unwrap_err(),
            ClaimError::Persistence(_)
        ));
        assert!(service.is_loaded());
        assert!(service.is_claimed(&cell(0, 0)));
        assert!(service.claim(&actor(2), cell(5, 5)).is_ok());

        let fresh = ClaimService::new(ClaimsConfig::default(), Arc::new(NullSink)).unwrap();
        assert!(fresh.load_from(&Broken).is_err());
        assert!(!fresh.is_loaded());
    }

    #[test]
    fn test_non_owner_cannot_manage() {
        let service = loaded(Arc::new(NullSink));
        let id = service.claim(&actor(1), cell(0, 0)).unwrap().region().id();
        let intruder = actor(2);

        assert_eq!(service.delete(&intruder, id).unwrap_err(), ClaimError::NotOwner);
        assert_eq!(
            service.unclaim(&intruder, &cell(0, 0)).unwrap_err(),
            ClaimError::NotOwner
        );
        assert_eq!(
            service
                .set_flag(&intruder, id, Flag::Pvp, true)
                .unwrap_err(),
            ClaimError::NotOwner
        );

        let admin = Actor::new(intruder.profile, true);
        assert!(service.set_flag(&admin, id, Flag::Pvp, true).is_ok());
    }

    #[test]
    fn test_trust_updates_level_in_place_and_cycles() {
        let service = loaded(Arc::new(NullSink));
        let owner = actor(1);
        let friend = actor(2).profile;
        let id = service.claim(&owner, cell(0, 0)).unwrap().region().id();

        service
            .trust(&owner, id, friend.clone(), TrustLevel::Trusted)
            .unwrap();
        let region = service
            .trust(&owner, id, friend.clone(), TrustLevel::Moderator)
            .unwrap();
        assert_eq!(region.member_count(), 1);
        assert_eq!(
            region.member(friend.id).map(|m| m.level),
            Some(TrustLevel::Moderator)
        );

        assert_eq!(
            service.cycle_trust(&owner, id, friend.id).unwrap(),
            TrustLevel::Admin
        );
        assert_eq!(
            service.cycle_trust(&owner, id, friend.id).unwrap(),
            TrustLevel::Trusted
        );

        service.untrust(&owner, id, friend.id).unwrap();
        assert_eq!(
            service.untrust(&owner, id, friend.id).unwrap_err(),
            ClaimError::NotFound(Missing::Member)
        );
    }

    #[test]
    fn test_set_flag_by_key() {
        let service = loaded(Arc::new(NullSink));
        let owner = actor(1);
        let id = service.claim(&owner, cell(0, 0)).unwrap().region().id();

        let region = service.set_flag_key(&owner, id, "PVP", true).unwrap();
        assert!(region.flag(Flag::Pvp));
        assert_eq!(
            service.set_flag_key(&owner, id, "teleport", true).unwrap_err(),
            ClaimError::InvalidFlag("teleport".into())
        );
    }

    #[test]
    fn test_expand_uses_region_under_actor() {
        let service = loaded(Arc::new(NullSink));
        let owner = actor(1);
        service.claim(&owner, cell(0, 0)).unwrap();

        let grown = service.expand(&owner, &cell(0, 0), cell(0, 1)).unwrap();
        assert_eq!(grown.cell_count(), 2);
        assert_eq!(
            service.expand(&owner, &cell(8, 8), cell(8, 9)).unwrap_err(),
            ClaimError::NotFound(Missing::Region)
        );
        assert_eq!(
            service.expand(&actor(2), &cell(0, 0), cell(1, 0)).unwrap_err(),
            ClaimError::NotOwner
        );
    }

    #[test]
    fn test_unclaim_last_cell_deletes_through_sink() {
        let sink = Arc::new(RecordingSink::default());
        let service = loaded(sink.clone());
        let owner = actor(1);
        let id = service.claim(&owner, cell(0, 0)).unwrap().region().id();

        let unbound = service.unclaim(&owner, &cell(0, 0)).unwrap();

        assert!(matches!(unbound, Unbound::Removed(_)));
        assert!(service.region(id).is_none());
        assert_eq!(*sink.deleted.lock(), vec![id]);
        assert_eq!(
            service.unclaim(&owner, &cell(0, 0)).unwrap_err(),
            ClaimError::NotClaimed
        );
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let sink = Arc::new(RecordingSink::default());
        sink.fail.store(true, Ordering::Relaxed);
        let service = loaded(sink);

        let err = service.claim(&actor(1), cell(0, 0)).unwrap_err();

        assert!(matches!(err, ClaimError::Persistence(_)));
        assert!(service.is_claimed(&cell(0, 0)));
    }

    #[test]
    fn test_quota_and_stats() {
        let service = loaded(Arc::new(NullSink));
        let owner = actor(1);
        service.claim(&owner, cell(0, 0)).unwrap();
        service.claim(&owner, cell(1, 0)).unwrap();
        service.claim(&actor(2), cell(10, 10)).unwrap();
        service
            .trust(&owner, RegionId(1), actor(3).profile, TrustLevel::Trusted)
            .unwrap();

        assert_eq!(
            service.stats(),
            ClaimStats {
                regions: 2,
                cells: 3,
                members: 1,
                owners: 2
            }
        );

        let loose = ClaimsConfig {
            require_adjacent: false,
            ..ClaimsConfig::default()
        };
        let service = ClaimService::new(loose, Arc::new(NullSink)).unwrap();
        service.finish_load(LoadedRegions::default());
        service.claim(&owner, cell(0, 0)).unwrap();
        assert_eq!(
            service.claim(&owner, cell(5, 5)).unwrap_err(),
            ClaimError::QuotaExceeded(Quota::Regions)
        );
    }

    #[test]
    fn test_handle_events() {
        let service = loaded(Arc::new(NullSink));
        let owner = actor(1);
        let stranger = actor(2);
        let id = service.claim(&owner, cell(0, 0)).unwrap().region().id();

        let interact = ProtectionEvent::Interact {
            actor: stranger.clone(),
            cell: cell(0, 0),
            target: InteractTarget::Door,
        };
        assert_eq!(service.handle(&interact), Verdict::Deny);
        assert_eq!(
            service.handle(&ProtectionEvent::Break {
                actor: owner.clone(),
                cell: cell(0, 0)
            }),
            Verdict::Allow
        );
        assert_eq!(
            service.handle(&ProtectionEvent::Combat { cell: cell(0, 0) }),
            Verdict::Deny
        );
        assert_eq!(
            service.handle(&ProtectionEvent::Environment {
                cell: cell(0, 0),
                effect: Environment::WaterFlow
            }),
            Verdict::Allow
        );
        assert_eq!(
            service.handle(&ProtectionEvent::Explosion {
                cells: vec![cell(0, 0), cell(3, 3)]
            }),
            Verdict::Filtered(vec![cell(3, 3)])
        );

        service.set_flag(&owner, id, Flag::Explosions, true).unwrap();
        assert_eq!(
            service.handle(&ProtectionEvent::Explosion {
                cells: vec![cell(0, 0)]
            }),
            Verdict::Filtered(vec![cell(0, 0)])
        );
    }

    #[test]
    fn test_disabled_switch_allows_intent() {
        let mut config = ClaimsConfig::default();
        config.protection.interact = false;
        let service = ClaimService::new(config, Arc::new(NullSink)).unwrap();
        service.finish_load(LoadedRegions::default());
        service.claim(&actor(1), cell(0, 0)).unwrap();

        let event = ProtectionEvent::Interact {
            actor: actor(2),
            cell: cell(0, 0),
            target: InteractTarget::Container,
        };
        assert_eq!(service.handle(&event), Verdict::Allow);
    }

    #[test]
    fn test_owner_name_lookup_and_teleport() {
        let service = loaded(Arc::new(NullSink));
        let id = service.claim(&actor(1), cell(2, 3)).unwrap().region().id();

        assert_eq!(service.regions_by_owner_name("PLAYER1").len(), 1);
        assert!(service.regions_by_owner_name("player9").is_empty());

        let pos = service
            .teleport_target(id, &GridCoordinates::default())
            .unwrap();
        assert!((pos.x - 40.5).abs() < f64::EPSILON);
        assert!((pos.z - 56.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rename_and_save_all() {
        let sink = Arc::new(RecordingSink::default());
        let service = loaded(sink.clone());
        let owner = actor(1);
        let id = service.claim(&owner, cell(0, 0)).unwrap().region().id();

        let region = service.rename(&owner, id, Some("Farm".into())).unwrap();
        assert_eq!(region.display_name(), "Farm");

        sink.saved.lock().clear();
        assert_eq!(service.save_all(), 1);
        assert_eq!(*sink.saved.lock(), vec![id]);
    }
}
