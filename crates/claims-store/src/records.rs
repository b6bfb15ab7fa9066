//! Row values, encoded with bincode.

use chrono::{DateTime, Utc};
use claims_core::{CellPos, Flag, Member, PlayerId, Profile, Region, TrustLevel, WorldId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Region header row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub owner: Uuid,
    pub owner_name: String,
    pub world: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl RegionRecord {
    pub fn of(region: &Region) -> Self {
        Self {
            owner: region.owner().id.0,
            owner_name: region.owner().name.clone(),
            world: region.world().as_str().to_owned(),
            name: region.custom_name().map(str::to_owned),
            created_at: region.created_at(),
            last_accessed: region.last_accessed(),
        }
    }

    pub fn owner(&self) -> Profile {
        Profile::new(PlayerId(self.owner), self.owner_name.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl CellRecord {
    pub fn of(cell: &CellPos) -> Self {
        Self {
            world: cell.world.as_str().to_owned(),
            x: cell.x,
            z: cell.z,
        }
    }

    pub fn into_cell(self) -> CellPos {
        CellPos::new(WorldId::new(self.world), self.x, self.z)
    }
}

/// One explicitly set flag. The key is stored as text so a renamed or
/// retired flag does not make the whole region unreadable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub key: String,
    pub value: bool,
}

impl FlagRecord {
    pub fn of(flag: Flag, value: bool) -> Self {
        Self {
            key: flag.key().to_owned(),
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub player: Uuid,
    pub name: String,
    pub level: TrustLevel,
    pub added_at: DateTime<Utc>,
}

impl MemberRecord {
    pub fn of(member: &Member) -> Self {
        Self {
            player: member.player.id.0,
            name: member.player.name.clone(),
            level: member.level,
            added_at: member.added_at,
        }
    }

    pub fn into_member(self) -> Member {
        Member {
            player: Profile::new(PlayerId(self.player), self.name),
            level: self.level,
            added_at: self.added_at,
        }
    }
}

/// Row of the flat legacy `claims` table: one claimed cell keyed by the
/// owner's raw name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyClaimRecord {
    pub world: String,
    pub x: i32,
    pub z: i32,
    pub owner: String,
}

/// Row of the legacy `claim_members` table, child of one legacy claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMemberRecord {
    pub player: String,
}
