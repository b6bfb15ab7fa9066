//! Spatial index: cell → region, owner → regions, id → region.
//!
//! All three maps live behind one `RwLock`. Regions are stored as
//! `Arc<Region>` snapshots and edited copy-on-write under the write lock, so
//! a reader either sees a region before an edit or after it, never a cell
//! bound to a region that does not list it.
//!
//! ```text
//!   by_cell:  CellPos  ──▶ RegionId ─┐
//!   by_owner: PlayerId ──▶ [RegionId]├──▶ by_id: RegionId ──▶ Arc<Region>
//! ```

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use smallvec::SmallVec;
use tracing::warn;

use crate::cell::CellPos;
use crate::error::{ClaimError, ClaimResult, Missing};
use crate::region::{PlayerId, Region, RegionId};

type OwnerRegions = SmallVec<[RegionId; 4]>;

#[derive(Default)]
struct IndexInner {
    by_cell: HashMap<CellPos, RegionId>,
    /// Per-owner regions in creation order.
    by_owner: HashMap<PlayerId, OwnerRegions>,
    by_id: HashMap<RegionId, Arc<Region>>,
}

impl IndexInner {
    fn lookup(&self, cell: &CellPos) -> Option<&Arc<Region>> {
        self.by_cell.get(cell).and_then(|id| self.by_id.get(id))
    }

    fn regions_of(&self, owner: PlayerId) -> Vec<Arc<Region>> {
        self.by_owner
            .get(&owner)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn owner_region_count(&self, owner: PlayerId) -> usize {
        self.by_owner.get(&owner).map_or(0, SmallVec::len)
    }

    fn sorted(&self) -> Vec<&Arc<Region>> {
        let mut regions: Vec<_> = self.by_id.values().collect();
        regions.sort_by_key(|r| r.id());
        regions
    }
}

/// Result of unbinding a cell.
#[derive(Debug, Clone)]
pub enum Unbound {
    /// The region still has cells.
    Shrunk(Arc<Region>),
    /// That was the last cell; the region, its members and flags are gone.
    Removed(Arc<Region>),
}

impl Unbound {
    #[must_use]
    pub fn region(&self) -> &Arc<Region> {
        match self {
            Self::Shrunk(r) | Self::Removed(r) => r,
        }
    }
}

/// Counts from a full index replacement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceReport {
    pub regions: usize,
    pub cells: usize,
    /// Cells dropped because an earlier region already held them.
    pub conflicts: usize,
    /// Regions dropped because they ended up with no cells.
    pub empty: usize,
}

/// Shared spatial index.
#[derive(Default)]
pub struct SpatialIndex {
    inner: RwLock<IndexInner>,
}

impl SpatialIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Region owning `cell`. O(1), never blocks on I/O.
    #[must_use]
    pub fn lookup(&self, cell: &CellPos) -> Option<Arc<Region>> {
        self.inner.read().lookup(cell).cloned()
    }

    #[must_use]
    pub fn is_claimed(&self, cell: &CellPos) -> bool {
        self.inner.read().by_cell.contains_key(cell)
    }

    #[must_use]
    pub fn by_id(&self, id: RegionId) -> Option<Arc<Region>> {
        self.inner.read().by_id.get(&id).cloned()
    }

    /// Regions of `owner` in creation order.
    #[must_use]
    pub fn regions_of(&self, owner: PlayerId) -> Vec<Arc<Region>> {
        self.inner.read().regions_of(owner)
    }

    /// Snapshot of every region, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Region>> {
        self.inner.read().sorted().into_iter().cloned().collect()
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.inner.read().by_id.len()
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.inner.read().by_cell.len()
    }

    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.inner.read().by_owner.len()
    }

    /// Largest region id currently indexed.
    #[must_use]
    pub fn max_id(&self) -> Option<RegionId> {
        self.inner.read().by_id.keys().max().copied()
    }

    /// Shared read access for several lookups under one lock.
    pub fn read(&self) -> IndexView<'_> {
        IndexView {
            inner: self.inner.read(),
        }
    }

    /// Exclusive access for a check-then-mutate sequence.
    pub fn write(&self) -> IndexTxn<'_> {
        IndexTxn {
            inner: self.inner.write(),
        }
    }

    /// Replace the whole index with `regions`.
    ///
    /// Regions are bound in the order given. A cell already bound by an
    /// earlier region is dropped from the later one.
    pub fn replace_all(&self, regions: impl IntoIterator<Item = Region>) -> ReplaceReport {
        let mut fresh = IndexInner::default();
        let mut report = ReplaceReport::default();

        for mut region in regions {
            let id = region.id();
            let taken: Vec<CellPos> = region
                .cells()
                .iter()
                .filter(|c| fresh.by_cell.contains_key(*c))
                .cloned()
                .collect();
            for cell in &taken {
                warn!(region = %id, %cell, "cell already bound to another region, dropping");
                region.remove_cell(cell);
            }
            report.conflicts += taken.len();

            if region.cell_count() == 0 {
                warn!(region = %id, "region has no cells, skipping");
                report.empty += 1;
                continue;
            }

            for cell in region.cells() {
                fresh.by_cell.insert(cell.clone(), id);
            }
            report.cells += region.cell_count();
            report.regions += 1;
            fresh
                .by_owner
                .entry(region.owner().id)
                .or_default()
                .push(id);
            fresh.by_id.insert(id, Arc::new(region));
        }

        for ids in fresh.by_owner.values_mut() {
            ids.sort();
        }

        *self.inner.write() = fresh;
        report
    }

    pub fn clear(&self) {
        *self.inner.write() = IndexInner::default();
    }
}

/// Read guard over the index.
pub struct IndexView<'a> {
    inner: RwLockReadGuard<'a, IndexInner>,
}

impl IndexView<'_> {
    #[must_use]
    pub fn lookup(&self, cell: &CellPos) -> Option<&Region> {
        self.inner.lookup(cell).map(AsRef::as_ref)
    }

    /// Every region, ordered by id.
    #[must_use]
    pub fn regions(&self) -> Vec<&Arc<Region>> {
        self.inner.sorted()
    }
}

/// Write guard over the index. Every mutation primitive lives here.
pub struct IndexTxn<'a> {
    inner: RwLockWriteGuard<'a, IndexInner>,
}

impl IndexTxn<'_> {
    #[must_use]
    pub fn lookup(&self, cell: &CellPos) -> Option<&Arc<Region>> {
        self.inner.lookup(cell)
    }

    #[must_use]
    pub fn by_id(&self, id: RegionId) -> Option<&Arc<Region>> {
        self.inner.by_id.get(&id)
    }

    #[must_use]
    pub fn regions_of(&self, owner: PlayerId) -> Vec<Arc<Region>> {
        self.inner.regions_of(owner)
    }

    #[must_use]
    pub fn owner_region_count(&self, owner: PlayerId) -> usize {
        self.inner.owner_region_count(owner)
    }

    /// Index a new region and bind all of its cells.
    pub fn insert(&mut self, region: Region) -> ClaimResult<Arc<Region>> {
        let inner = &mut *self.inner;
        if region.cells().iter().any(|c| inner.by_cell.contains_key(c)) {
            return Err(ClaimError::AlreadyClaimed);
        }
        let id = region.id();
        for cell in region.cells() {
            inner.by_cell.insert(cell.clone(), id);
        }
        inner
            .by_owner
            .entry(region.owner().id)
            .or_default()
            .push(id);
        let region = Arc::new(region);
        inner.by_id.insert(id, Arc::clone(&region));
        Ok(region)
    }

    /// Add `cell` to region `id` and bind it, in one step.
    pub fn bind_cell(&mut self, id: RegionId, cell: CellPos) -> ClaimResult<Arc<Region>> {
        let inner = &mut *self.inner;
        if inner.by_cell.contains_key(&cell) {
            return Err(ClaimError::AlreadyClaimed);
        }
        let slot = inner
            .by_id
            .get_mut(&id)
            .ok_or(ClaimError::NotFound(Missing::Region))?;
        let region = Arc::make_mut(slot);
        region.insert_cell(cell.clone());
        region.touch();
        inner.by_cell.insert(cell, id);
        Ok(Arc::clone(slot))
    }

    /// Remove `cell` from its region and unbind it. Deletes the region when
    /// that was its last cell.
    pub fn unbind_cell(&mut self, cell: &CellPos) -> Option<Unbound> {
        let id = *self.inner.by_cell.get(cell)?;
        let inner = &mut *self.inner;
        let Some(slot) = inner.by_id.get_mut(&id) else {
            inner.by_cell.remove(cell);
            return None;
        };
        let region = Arc::make_mut(slot);
        region.remove_cell(cell);
        region.touch();
        inner.by_cell.remove(cell);

        if region.cell_count() == 0 {
            return self.remove(id).map(Unbound::Removed);
        }
        Some(Unbound::Shrunk(Arc::clone(slot)))
    }

    /// Drop a region and every binding that points at it.
    pub fn remove(&mut self, id: RegionId) -> Option<Arc<Region>> {
        let inner = &mut *self.inner;
        let region = inner.by_id.remove(&id)?;
        for cell in region.cells() {
            inner.by_cell.remove(cell);
        }
        let owner = region.owner().id;
        if let Some(ids) = inner.by_owner.get_mut(&owner) {
            ids.retain(|r| *r != id);
            if ids.is_empty() {
                inner.by_owner.remove(&owner);
            }
        }
        Some(region)
    }

    /// Edit the non-cell parts of a region.
    pub fn update<R>(
        &mut self,
        id: RegionId,
        f: impl FnOnce(&mut Region) -> R,
    ) -> Option<(Arc<Region>, R)> {
        let slot = self.inner.by_id.get_mut(&id)?;
        let out = f(Arc::make_mut(slot));
        Some((Arc::clone(slot), out))
    }
}
