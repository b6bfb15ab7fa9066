//! Region growth: decide whether a cell creates a region, merges into one,
//! or is rejected.
//!
//! Every function here runs inside one [`IndexTxn`], so the checks and the
//! binding they lead to are atomic with respect to other claims.

use std::sync::Arc;

use tracing::debug;

use crate::cell::CellPos;
use crate::error::{ClaimError, ClaimResult, Missing, Quota};
use crate::flag::FlagValues;
use crate::index::{IndexTxn, Unbound};
use crate::region::{Profile, Region, RegionId};

/// Growth rules taken from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrowthPolicy {
    pub require_adjacent: bool,
    pub max_regions_per_owner: usize,
    pub max_cells_per_region: usize,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            require_adjacent: true,
            max_regions_per_owner: 1,
            max_cells_per_region: 100,
        }
    }
}

/// What a successful claim did.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// A new single-cell region.
    Created(Arc<Region>),
    /// The cell joined an existing region.
    Merged(Arc<Region>),
}

impl ClaimOutcome {
    #[must_use]
    pub fn region(&self) -> &Arc<Region> {
        match self {
            Self::Created(r) | Self::Merged(r) => r,
        }
    }
}

/// Inputs for a region that may be created by a claim.
pub struct Seed<F: FnOnce() -> RegionId> {
    pub owner: Profile,
    pub flags: FlagValues,
    /// Called only when a region is actually created.
    pub allocate: F,
}

/// Claim `cell` for `seed.owner`.
///
/// With adjacency required, the owner's regions are scanned in creation order
/// and the first one sharing an edge with `cell` absorbs it. When nothing
/// absorbs the cell, an owner at the region quota gets
/// [`ClaimError::QuotaExceeded`]; below it, the cell starts a new region only
/// if the owner has none yet, otherwise [`ClaimError::NotAdjacent`].
pub fn claim<F: FnOnce() -> RegionId>(
    txn: &mut IndexTxn<'_>,
    policy: &GrowthPolicy,
    cell: CellPos,
    seed: Seed<F>,
) -> ClaimResult<ClaimOutcome> {
    if txn.lookup(&cell).is_some() {
        return Err(ClaimError::AlreadyClaimed);
    }

    let owner = seed.owner.id;

    if policy.require_adjacent {
        let absorbing = txn
            .regions_of(owner)
            .into_iter()
            .find(|r| r.touches(&cell));

        if let Some(region) = absorbing {
            if region.cell_count() >= policy.max_cells_per_region {
                return Err(ClaimError::QuotaExceeded(Quota::Cells));
            }
            let merged = txn.bind_cell(region.id(), cell)?;
            debug!(region = %merged.id(), cells = merged.cell_count(), "merged cell into region");
            return Ok(ClaimOutcome::Merged(merged));
        }
    }

    let owned = txn.owner_region_count(owner);
    if owned >= policy.max_regions_per_owner {
        return Err(ClaimError::QuotaExceeded(Quota::Regions));
    }
    if policy.require_adjacent && owned > 0 {
        return Err(ClaimError::NotAdjacent);
    }

    let region = Region::new((seed.allocate)(), seed.owner, cell, seed.flags);
    let created = txn.insert(region)?;
    debug!(region = %created.id(), owner = %created.owner().name, "created region");
    Ok(ClaimOutcome::Created(created))
}

/// Grow one explicitly chosen region by `cell`. The cell must be in the
/// region's world even when adjacency is not required.
pub fn expand(
    txn: &mut IndexTxn<'_>,
    policy: &GrowthPolicy,
    target: RegionId,
    cell: CellPos,
) -> ClaimResult<Arc<Region>> {
    if txn.lookup(&cell).is_some() {
        return Err(ClaimError::AlreadyClaimed);
    }
    let region = txn
        .by_id(target)
        .ok_or(ClaimError::NotFound(Missing::Region))?;

    if cell.world != *region.world() || (policy.require_adjacent && !region.touches(&cell)) {
        return Err(ClaimError::NotAdjacent);
    }
    if region.cell_count() >= policy.max_cells_per_region {
        return Err(ClaimError::QuotaExceeded(Quota::Cells));
    }

    txn.bind_cell(target, cell)
}

/// Remove `cell` from whichever region holds it.
///
/// Connectivity is not re-checked: the remaining cells may form islands.
pub fn remove(txn: &mut IndexTxn<'_>, cell: &CellPos) -> ClaimResult<Unbound> {
    txn.unbind_cell(cell).ok_or(ClaimError::NotClaimed)
}
