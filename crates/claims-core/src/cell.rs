//! Cell coordinates and cell-set geometry.
//!
//! A cell is one 16×16 column of the world, addressed by `(world, x, z)`.
//! Two cells are adjacent only when they share an edge in the same world;
//! diagonal neighbours do not count.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// Number of blocks along one edge of a cell.
pub const CELL_SIZE: i32 = 16;

/// Blocks covered by a single cell.
pub const CELL_AREA: u64 = (CELL_SIZE * CELL_SIZE) as u64;

/// Name of a world. Cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(Arc<str>);

impl WorldId {
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Coordinates of one cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

impl CellPos {
    #[must_use]
    pub fn new(world: impl Into<WorldId>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// Cell containing the given block column.
    #[must_use]
    pub fn from_block(world: impl Into<WorldId>, block_x: i32, block_z: i32) -> Self {
        Self::new(
            world,
            block_x.div_euclid(CELL_SIZE),
            block_z.div_euclid(CELL_SIZE),
        )
    }

    /// Block column at the middle of this cell. Widened so cells near the
    /// `i32` limits stay exact.
    #[must_use]
    pub const fn center_block(&self) -> (i64, i64) {
        const HALF: i64 = (CELL_SIZE / 2) as i64;
        (
            self.x as i64 * CELL_SIZE as i64 + HALF,
            self.z as i64 * CELL_SIZE as i64 + HALF,
        )
    }

    /// True when `other` shares an edge with `self` in the same world.
    #[must_use]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        if self.world != other.world {
            return false;
        }
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        (dx == 1 && dz == 0) || (dx == 0 && dz == 1)
    }

    /// The edge neighbours, in +x, -x, +z, -z order. Neighbours past the
    /// `i32` range do not exist and are skipped.
    pub fn neighbors(&self) -> impl Iterator<Item = Self> + '_ {
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .into_iter()
            .filter_map(|(dx, dz)| self.offset(dx, dz))
    }

    /// The cell `(dx, dz)` away, or `None` when that leaves the `i32` range.
    #[must_use]
    pub fn offset(&self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            world: self.world.clone(),
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
        })
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.world, self.x, self.z)
    }
}

/// Inclusive bounding box of a cell set, in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl Bounds {
    /// Bounding box of `cells`, or `None` for an empty set.
    pub fn of<'a>(cells: impl IntoIterator<Item = &'a CellPos>) -> Option<Self> {
        let mut iter = cells.into_iter();
        let first = iter.next()?;
        let init = Self {
            min_x: first.x,
            min_z: first.z,
            max_x: first.x,
            max_z: first.z,
        };
        Some(iter.fold(init, |b, c| Self {
            min_x: b.min_x.min(c.x),
            min_z: b.min_z.min(c.z),
            max_x: b.max_x.max(c.x),
            max_z: b.max_z.max(c.z),
        }))
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max_x.abs_diff(self.min_x) + 1
    }

    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.max_z.abs_diff(self.min_z) + 1
    }
}

/// Cells of `cells` with at least one edge neighbour outside the set.
#[must_use]
pub fn border_cells(cells: &HashSet<CellPos>) -> Vec<CellPos> {
    let mut border: Vec<CellPos> = cells
        .iter()
        .filter(|c| c.neighbors().any(|n| !cells.contains(&n)))
        .cloned()
        .collect();
    border.sort();
    border
}

/// Every cell in the square of side `2 * radius + 1` centred on `center`.
#[must_use]
pub fn cells_in_radius(center: &CellPos, radius: u32) -> Vec<CellPos> {
    let r = i32::try_from(radius).unwrap_or(i32::MAX);
    let side = (radius as usize).saturating_mul(2).saturating_add(1);
    let mut cells = Vec::with_capacity(side.saturating_mul(side));
    for x in -r..=r {
        cells.extend((-r..=r).filter_map(|z| center.offset(x, z)));
    }
    cells
}

/// Area in blocks covered by `count` cells.
#[must_use]
pub const fn area_blocks(count: usize) -> u64 {
    count as u64 * CELL_AREA
}
