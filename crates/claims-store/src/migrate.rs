//! One-time migration from the flat legacy schema.
//!
//! The legacy layout has one `claims` row per claimed cell, keyed by a legacy
//! claim id and naming its owner by raw player name, plus `claim_members` rows
//! keyed by `(claim id, row)`. Migration groups every cell of one owner in
//! one world into a single region, whether or not the cells touch, and
//! carries the members of those cells over as `trusted`.
//!
//! LMDB cannot rename a database, so the legacy rows are copied into
//! `legacy_claims_migrated` / `legacy_members_migrated` and the originals are
//! cleared, all in the write transaction that stores the new regions. The
//! existence of `legacy_claims_migrated` marks the migration as done.

use chrono::Utc;
use claims_core::{
    CellPos, FlagValues, Member, PlayerId, Profile, Region, RegionId, RegionParts, TrustLevel,
    WorldId,
};
use hashbrown::HashMap;
use heed::types::Bytes;
use tracing::{debug, info, warn};

use crate::db::{ClaimDb, Table, rows};
use crate::error::StoreResult;
use crate::keys::{ChildKey, RegionKey};
use crate::records::{LegacyClaimRecord, LegacyMemberRecord};

pub(crate) const LEGACY_CLAIMS: &str = "claims";
pub(crate) const LEGACY_MEMBERS: &str = "claim_members";
pub(crate) const MIGRATED_CLAIMS: &str = "legacy_claims_migrated";
pub(crate) const MIGRATED_MEMBERS: &str = "legacy_members_migrated";

/// Counts from a completed migration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub legacy_cells: usize,
    pub legacy_members: usize,
    pub regions: usize,
    pub members: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Migration {
    /// No legacy rows exist.
    NoLegacyData,
    /// A previous run already moved the legacy rows.
    AlreadyMigrated,
    Migrated(MigrationReport),
}

struct Group {
    owner: Profile,
    world: WorldId,
    cells: Vec<CellPos>,
    members: Vec<Member>,
}

impl ClaimDb {
    /// Migrate legacy rows, resolving names with [`PlayerId::from_legacy_name`].
    pub fn migrate_legacy(&self, flags: FlagValues) -> StoreResult<Migration> {
        self.migrate_legacy_with(flags, PlayerId::from_legacy_name)
    }

    /// Migrate legacy rows. New regions start with `flags` and take ids
    /// after every id the store has handed out.
    pub fn migrate_legacy_with(
        &self,
        flags: FlagValues,
        resolve: impl Fn(&str) -> PlayerId,
    ) -> StoreResult<Migration> {
        let mut wtxn = self.env.write_txn()?;

        if self
            .env
            .open_database::<Bytes, Bytes>(&wtxn, Some(MIGRATED_CLAIMS))?
            .is_some()
        {
            debug!("legacy claims already migrated");
            return Ok(Migration::AlreadyMigrated);
        }
        let Some(legacy_claims) = self
            .env
            .open_database::<Bytes, Bytes>(&wtxn, Some(LEGACY_CLAIMS))?
        else {
            return Ok(Migration::NoLegacyData);
        };
        let legacy_members = self
            .env
            .open_database::<Bytes, Bytes>(&wtxn, Some(LEGACY_MEMBERS))?;

        let claim_rows = rows(legacy_claims, &wtxn)?;
        if claim_rows.is_empty() {
            return Ok(Migration::NoLegacyData);
        }
        let member_rows = match legacy_members {
            Some(table) => rows(table, &wtxn)?,
            None => Vec::new(),
        };

        let mut groups: Vec<Group> = Vec::new();
        let mut slots: HashMap<(PlayerId, WorldId), usize> = HashMap::new();
        let mut claim_slot: HashMap<RegionId, usize> = HashMap::new();

        for (key, value) in &claim_rows {
            let claim = RegionKey::decode(LEGACY_CLAIMS, key)?.id();
            let row: LegacyClaimRecord = bincode::deserialize(value)?;
            let owner = resolve(&row.owner);
            let world = WorldId::new(&row.world);

            let slot = *slots.entry((owner, world.clone())).or_insert_with(|| {
                groups.push(Group {
                    owner: Profile::new(owner, row.owner.clone()),
                    world: world.clone(),
                    cells: Vec::new(),
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].cells.push(CellPos::new(world, row.x, row.z));
            claim_slot.insert(claim, slot);
        }

        let mut carried = 0;
        for (key, value) in &member_rows {
            let claim = ChildKey::decode(LEGACY_MEMBERS, key)?.region();
            let Some(&slot) = claim_slot.get(&claim) else {
                warn!(claim = claim.0, "legacy member of unknown claim, skipping");
                continue;
            };
            let row: LegacyMemberRecord = bincode::deserialize(value)?;
            let player = resolve(&row.player);
            let group = &mut groups[slot];
            if group.owner.id == player || group.members.iter().any(|m| m.player.id == player) {
                continue;
            }
            group
                .members
                .push(Member::new(Profile::new(player, row.player), TrustLevel::Trusted));
            carried += 1;
        }

        let now = Utc::now();
        let mut next = self.next_id(&wtxn)?;
        for group in &groups {
            let region = Region::from_parts(RegionParts {
                id: RegionId(next),
                owner: group.owner.clone(),
                world: group.world.clone(),
                name: None,
                cells: group.cells.clone(),
                members: group.members.clone(),
                flags,
                created_at: now,
                last_accessed: now,
            });
            next += 1;
            self.write_region(&mut wtxn, &region)?;
            debug!(
                region = %region.id(),
                owner = %region.owner().name,
                cells = region.cell_count(),
                "migrated legacy claims"
            );
        }

        let migrated_claims: Table = self
            .env
            .create_database(&mut wtxn, Some(MIGRATED_CLAIMS))?;
        let migrated_members: Table = self
            .env
            .create_database(&mut wtxn, Some(MIGRATED_MEMBERS))?;
        for (key, value) in &claim_rows {
            migrated_claims.put(&mut wtxn, key, value)?;
        }
        for (key, value) in &member_rows {
            migrated_members.put(&mut wtxn, key, value)?;
        }
        legacy_claims.clear(&mut wtxn)?;
        if let Some(table) = legacy_members {
            table.clear(&mut wtxn)?;
        }
        wtxn.commit()?;

        let report = MigrationReport {
            legacy_cells: claim_rows.len(),
            legacy_members: member_rows.len(),
            regions: groups.len(),
            members: carried,
        };
        info!(
            cells = report.legacy_cells,
            regions = report.regions,
            members = report.members,
            "migrated legacy claim schema"
        );
        Ok(Migration::Migrated(report))
    }
}
