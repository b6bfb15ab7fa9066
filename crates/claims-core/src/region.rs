//! Region and member entities.

use core::fmt;

use chrono::{DateTime, Utc};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::{CellPos, WorldId, area_blocks};
use crate::flag::{Flag, FlagValues};
use crate::trust::TrustLevel;

/// Namespace for identities derived from legacy player names.
const LEGACY_NAMESPACE: Uuid = Uuid::from_u128(0x6f3c_1a52_9d1e_4b7a_8c0e_2f5d_7a91_b3c4);

/// Region identifier, assigned before the region becomes visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable player identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Deterministic identity for a player known only by name.
    ///
    /// Names are case-insensitive, matching how the legacy schema compared them.
    #[must_use]
    pub fn from_legacy_name(name: &str) -> Self {
        Self(Uuid::new_v5(
            &LEGACY_NAMESPACE,
            name.to_ascii_lowercase().as_bytes(),
        ))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A player's id together with the name they were last seen with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    pub id: PlayerId,
    pub name: String,
}

impl Profile {
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A trusted player within one region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub player: Profile,
    pub level: TrustLevel,
    pub added_at: DateTime<Utc>,
}

impl Member {
    #[must_use]
    pub fn new(player: Profile, level: TrustLevel) -> Self {
        Self {
            player,
            level,
            added_at: Utc::now(),
        }
    }
}

/// Every field of a region, used to rebuild one from storage.
#[derive(Clone, Debug)]
pub struct RegionParts {
    pub id: RegionId,
    pub owner: Profile,
    pub world: WorldId,
    pub name: Option<String>,
    pub cells: Vec<CellPos>,
    pub members: Vec<Member>,
    pub flags: FlagValues,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// An owned aggregate of cells, members, and flags.
///
/// The cell set is only edited through the spatial index, which keeps the
/// cell → region binding in step with it.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    id: RegionId,
    owner: Profile,
    world: WorldId,
    name: Option<String>,
    cells: HashSet<CellPos>,
    members: HashMap<PlayerId, Member>,
    flags: FlagValues,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

impl Region {
    /// A fresh single-cell region.
    #[must_use]
    pub fn new(id: RegionId, owner: Profile, cell: CellPos, flags: FlagValues) -> Self {
        let now = Utc::now();
        let mut cells = HashSet::new();
        let world = cell.world.clone();
        cells.insert(cell);
        Self {
            id,
            owner,
            world,
            name: None,
            cells,
            members: HashMap::new(),
            flags,
            created_at: now,
            last_accessed: now,
        }
    }

    /// Rebuild a region from its stored parts. Duplicate members keep the last entry.
    #[must_use]
    pub fn from_parts(parts: RegionParts) -> Self {
        Self {
            id: parts.id,
            owner: parts.owner,
            world: parts.world,
            name: parts.name,
            cells: parts.cells.into_iter().collect(),
            members: parts
                .members
                .into_iter()
                .map(|m| (m.player.id, m))
                .collect(),
            flags: parts.flags,
            created_at: parts.created_at,
            last_accessed: parts.last_accessed,
        }
    }

    #[must_use]
    pub const fn id(&self) -> RegionId {
        self.id
    }

    #[must_use]
    pub const fn owner(&self) -> &Profile {
        &self.owner
    }

    #[must_use]
    pub fn is_owner(&self, player: PlayerId) -> bool {
        self.owner.id == player
    }

    #[must_use]
    pub const fn world(&self) -> &WorldId {
        &self.world
    }

    /// Custom name, if one was set.
    #[must_use]
    pub fn custom_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name shown to players: the custom name, or `"<owner>'s Claim"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}'s Claim", self.owner.name))
    }

    #[must_use]
    pub const fn cells(&self) -> &HashSet<CellPos> {
        &self.cells
    }

    /// Cells in coordinate order.
    #[must_use]
    pub fn sorted_cells(&self) -> Vec<CellPos> {
        let mut cells: Vec<_> = self.cells.iter().cloned().collect();
        cells.sort();
        cells
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn contains(&self, cell: &CellPos) -> bool {
        self.cells.contains(cell)
    }

    /// True when `cell` shares an edge with any cell of this region.
    #[must_use]
    pub fn touches(&self, cell: &CellPos) -> bool {
        if self.cells.len() > 4 {
            return cell.neighbors().any(|n| self.cells.contains(&n));
        }
        self.cells.iter().any(|c| c.is_adjacent(cell))
    }

    #[must_use]
    pub fn area_blocks(&self) -> u64 {
        area_blocks(self.cells.len())
    }

    #[must_use]
    pub fn member(&self, player: PlayerId) -> Option<&Member> {
        self.members.get(&player)
    }

    /// Members ordered by the time they were added.
    #[must_use]
    pub fn members(&self) -> Vec<&Member> {
        let mut members: Vec<_> = self.members.values().collect();
        members.sort_by(|a, b| {
            a.added_at
                .cmp(&b.added_at)
                .then_with(|| a.player.id.cmp(&b.player.id))
        });
        members
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn flag(&self, flag: Flag) -> bool {
        self.flags.get(flag)
    }

    #[must_use]
    pub const fn flags(&self) -> &FlagValues {
        &self.flags
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn last_accessed(&self) -> DateTime<Utc> {
        self.last_accessed
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        self.flags.set(flag, value);
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name.filter(|n| !n.trim().is_empty());
    }

    /// Refresh the owner's display name.
    pub fn set_owner_name(&mut self, name: impl Into<String>) {
        self.owner.name = name.into();
    }

    /// Insert or replace the member for `member.player.id`. Returns the previous entry.
    pub fn upsert_member(&mut self, member: Member) -> Option<Member> {
        self.members.insert(member.player.id, member)
    }

    pub fn remove_member(&mut self, player: PlayerId) -> Option<Member> {
        self.members.remove(&player)
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    pub(crate) fn insert_cell(&mut self, cell: CellPos) -> bool {
        self.cells.insert(cell)
    }

    pub(crate) fn remove_cell(&mut self, cell: &CellPos) -> bool {
        self.cells.remove(cell)
    }

    /// Decompose for storage.
    #[must_use]
    pub fn to_parts(&self) -> RegionParts {
        RegionParts {
            id: self.id,
            owner: self.owner.clone(),
            world: self.world.clone(),
            name: self.name.clone(),
            cells: self.sorted_cells(),
            members: self.members().into_iter().cloned().collect(),
            flags: self.flags,
            created_at: self.created_at,
            last_accessed: self.last_accessed,
        }
    }
}
