//! LMDB tables for regions and their child rows.

use std::ops::Bound;
use std::path::Path;

use claims_core::{
    CellPos, Flag, FlagValues, LoadedRegions, Member, PersistError, Region, RegionId, RegionParts,
    RegionSource, WorldId,
};
use hashbrown::HashMap;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::{debug, info, trace, warn};

use crate::error::{StoreError, StoreResult};
use crate::keys::{ChildKey, RegionKey};
use crate::records::{CellRecord, FlagRecord, MemberRecord, RegionRecord};

pub(crate) const REGIONS: &str = "regions";
pub(crate) const CELLS: &str = "cells";
pub(crate) const FLAGS: &str = "flags";
pub(crate) const MEMBERS: &str = "members";
pub(crate) const META: &str = "meta";

const NEXT_ID: &[u8] = b"next_id";

pub(crate) type Table = Database<Bytes, Bytes>;

/// The region-grouped store: region headers plus cell, flag and member rows.
///
/// A save replaces every child row of the region in the same write
/// transaction as its header, so concurrent saves of one region settle on
/// whichever committed last.
pub struct ClaimDb {
    pub(crate) env: Env,
    regions: Table,
    cells: Table,
    flags: Table,
    members: Table,
    meta: Table,
}

impl ClaimDb {
    /// Open or create the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the directory or environment cannot be created.
    #[allow(unsafe_code)]
    pub fn open(path: impl AsRef<Path>, map_size: usize) -> StoreResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process and never
        // reopened with different options.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(16)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let regions = env.create_database(&mut wtxn, Some(REGIONS))?;
        let cells = env.create_database(&mut wtxn, Some(CELLS))?;
        let flags = env.create_database(&mut wtxn, Some(FLAGS))?;
        let members = env.create_database(&mut wtxn, Some(MEMBERS))?;
        let meta = env.create_database(&mut wtxn, Some(META))?;
        wtxn.commit()?;

        info!(path = %path.display(), "opened claim store");
        Ok(Self {
            env,
            regions,
            cells,
            flags,
            members,
            meta,
        })
    }

    /// Rebuild every region from its rows, ordered by id.
    ///
    /// Child rows without a header and flags with unknown keys are skipped
    /// with a warning.
    pub fn load_regions(&self) -> StoreResult<LoadedRegions> {
        let rtxn = self.env.read_txn()?;

        let mut cells: HashMap<RegionId, Vec<CellPos>> = HashMap::new();
        for entry in self.cells.iter(&rtxn)? {
            let (key, value) = entry?;
            let key = ChildKey::decode(CELLS, key)?;
            let record: CellRecord = bincode::deserialize(value)?;
            cells.entry(key.region()).or_default().push(record.into_cell());
        }

        let mut flags: HashMap<RegionId, FlagValues> = HashMap::new();
        for entry in self.flags.iter(&rtxn)? {
            let (key, value) = entry?;
            let key = ChildKey::decode(FLAGS, key)?;
            let record: FlagRecord = bincode::deserialize(value)?;
            match Flag::from_key(&record.key) {
                Some(flag) => flags.entry(key.region()).or_default().set(flag, record.value),
                None => warn!(region = %key.region(), flag = %record.key, "skipping unknown flag"),
            }
        }

        let mut members: HashMap<RegionId, Vec<Member>> = HashMap::new();
        for entry in self.members.iter(&rtxn)? {
            let (key, value) = entry?;
            let key = ChildKey::decode(MEMBERS, key)?;
            let record: MemberRecord = bincode::deserialize(value)?;
            members
                .entry(key.region())
                .or_default()
                .push(record.into_member());
        }

        let mut regions = Vec::new();
        for entry in self.regions.iter(&rtxn)? {
            let (key, value) = entry?;
            let id = RegionKey::decode(REGIONS, key)?.id();
            let record: RegionRecord = bincode::deserialize(value)?;
            regions.push(Region::from_parts(RegionParts {
                id,
                owner: record.owner(),
                world: WorldId::new(&record.world),
                name: record.name,
                cells: cells.remove(&id).unwrap_or_default(),
                members: members.remove(&id).unwrap_or_default(),
                flags: flags.remove(&id).unwrap_or_default(),
                created_at: record.created_at,
                last_accessed: record.last_accessed,
            }));
        }

        for id in cells.keys().chain(members.keys()).chain(flags.keys()) {
            warn!(region = %id, "child rows without a region header");
        }

        let next_id = self.next_id(&rtxn)?;
        debug!(regions = regions.len(), next_id, "read regions from store");
        Ok(LoadedRegions { regions, next_id })
    }

    /// Upsert the header and replace every child row of `region`.
    pub fn save(&self, region: &Region) -> StoreResult<()> {
        let mut wtxn = self.env.write_txn()?;
        self.write_region(&mut wtxn, region)?;
        wtxn.commit()?;

        trace!(region = %region.id(), cells = region.cell_count(), "saved region");
        Ok(())
    }

    /// Delete the header and every child row of region `id`.
    ///
    /// Returns whether a header existed.
    pub fn delete(&self, id: RegionId) -> StoreResult<bool> {
        let mut wtxn = self.env.write_txn()?;
        let existed = self.regions.delete(&mut wtxn, RegionKey::new(id).as_bytes())?;
        self.clear_children(&mut wtxn, id)?;
        wtxn.commit()?;

        trace!(region = %id, existed, "deleted region");
        Ok(existed)
    }

    /// Number of stored region headers.
    pub fn region_count(&self) -> StoreResult<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.regions.len(&rtxn)?)
    }

    pub(crate) fn write_region(&self, wtxn: &mut RwTxn<'_>, region: &Region) -> StoreResult<()> {
        let id = region.id();
        let header = bincode::serialize(&RegionRecord::of(region))?;
        self.regions.put(wtxn, RegionKey::new(id).as_bytes(), &header)?;

        self.clear_children(wtxn, id)?;
        for (row, cell) in (0u32..).zip(region.sorted_cells()) {
            let value = bincode::serialize(&CellRecord::of(&cell))?;
            self.cells.put(wtxn, ChildKey::new(id, row).as_bytes(), &value)?;
        }
        for (row, (flag, enabled)) in (0u32..).zip(region.flags().explicit()) {
            let value = bincode::serialize(&FlagRecord::of(flag, enabled))?;
            self.flags.put(wtxn, ChildKey::new(id, row).as_bytes(), &value)?;
        }
        for (row, member) in (0u32..).zip(region.members()) {
            let value = bincode::serialize(&MemberRecord::of(member))?;
            self.members.put(wtxn, ChildKey::new(id, row).as_bytes(), &value)?;
        }

        let next = self.next_id(wtxn)?.max(id.0 + 1);
        self.meta.put(wtxn, NEXT_ID, &next.to_be_bytes())?;
        Ok(())
    }

    pub(crate) fn next_id(&self, txn: &RoTxn<'_>) -> StoreResult<u64> {
        let stored = self
            .meta
            .get(txn, NEXT_ID)?
            .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
            .map(u64::from_be_bytes);
        Ok(stored.unwrap_or(1))
    }

    fn clear_children(&self, wtxn: &mut RwTxn<'_>, id: RegionId) -> StoreResult<()> {
        let (lo, hi) = ChildKey::span(id);
        let range = (Bound::Included(lo.as_bytes()), Bound::Included(hi.as_bytes()));
        for table in [self.cells, self.flags, self.members] {
            table.delete_range(wtxn, &range)?;
        }
        Ok(())
    }
}

impl RegionSource for ClaimDb {
    fn load_all(&self) -> Result<LoadedRegions, PersistError> {
        self.load_regions().map_err(PersistError::from)
    }
}

/// Copy every row of `table` out of the transaction.
pub(crate) fn rows(table: Table, txn: &RoTxn<'_>) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
    table
        .iter(txn)?
        .map(|entry| {
            entry
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(StoreError::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_core::{PlayerId, Profile, TrustLevel};
    use uuid::Uuid;

    const MAP_SIZE: usize = 16 * 1024 * 1024;

    fn profile(n: u128, name: &str) -> Profile {
        Profile::new(PlayerId(Uuid::from_u128(n)), name)
    }

    fn sample(id: u64) -> Region {
        let mut region = Region::new(
            RegionId(id),
            profile(1, "Steve"),
            CellPos::new("world", 0, 0),
            FlagValues::default(),
        );
        region.set_name(Some("Base".into()));
        region.set_flag(Flag::Pvp, true);
        region.set_flag(Flag::MobSpawning, false);
        region.upsert_member(Member::new(profile(2, "Alex"), TrustLevel::Moderator));
        region
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path(), MAP_SIZE).unwrap();

        let loaded = db.load_regions().unwrap();
        assert!(loaded.regions.is_empty());
        assert_eq!(loaded.next_id, 1);
    }

    #[test]
    fn test_save_replaces_child_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path(), MAP_SIZE).unwrap();

        let mut parts = sample(3).to_parts();
        parts.cells = (0..5).map(|x| CellPos::new("world", x, 0)).collect();
        db.save(&Region::from_parts(parts)).unwrap();

        let narrow = Region::new(
            RegionId(3),
            profile(1, "Steve"),
            CellPos::new("world", 9, 9),
            FlagValues::default(),
        );
        db.save(&narrow).unwrap();

        let loaded = db.load_regions().unwrap();
        assert_eq!(loaded.regions.len(), 1);
        assert_eq!(loaded.regions[0].sorted_cells(), vec![CellPos::new("world", 9, 9)]);
        assert_eq!(loaded.next_id, 4);
    }

    #[test]
    fn test_delete_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path(), MAP_SIZE).unwrap();
        db.save(&sample(1)).unwrap();
        db.save(&sample(2)).unwrap();

        assert!(db.delete(RegionId(1)).unwrap());
        assert!(!db.delete(RegionId(1)).unwrap());

        let loaded = db.load_regions().unwrap();
        assert_eq!(loaded.regions.len(), 1);
        assert_eq!(loaded.regions[0].id(), RegionId(2));
        assert_eq!(loaded.regions[0].member_count(), 1);

        let rtxn = db.env.read_txn().unwrap();
        let (lo, hi) = ChildKey::span(RegionId(1));
        for table in [db.cells, db.flags, db.members] {
            let left = table
                .range(
                    &rtxn,
                    &(Bound::Included(lo.as_bytes()), Bound::Included(hi.as_bytes())),
                )
                .unwrap()
                .count();
            assert_eq!(left, 0);
        }
    }

    #[test]
    fn test_regions_load_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path(), MAP_SIZE).unwrap();
        for id in [300, 2, 41] {
            db.save(&sample(id)).unwrap();
        }

        let ids: Vec<_> = db
            .load_regions()
            .unwrap()
            .regions
            .iter()
            .map(Region::id)
            .collect();
        assert_eq!(ids, vec![RegionId(2), RegionId(41), RegionId(300)]);
        assert_eq!(db.region_count().unwrap(), 3);
    }

    #[test]
    fn test_unknown_flag_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let db = ClaimDb::open(dir.path(), MAP_SIZE).unwrap();
        db.save(&sample(1)).unwrap();

        let mut wtxn = db.env.write_txn().unwrap();
        let stale = bincode::serialize(&FlagRecord {
            key: "teleport".into(),
            value: true,
        })
        .unwrap();
        db.flags
            .put(&mut wtxn, ChildKey::new(RegionId(1), 99).as_bytes(), &stale)
            .unwrap();
        wtxn.commit().unwrap();

        let loaded = db.load_regions().unwrap();
        let region = &loaded.regions[0];
        assert_eq!(region.flags().explicit().count(), 2);
        assert!(region.flag(Flag::Pvp));
        assert!(!region.flag(Flag::MobSpawning));
    }
}
