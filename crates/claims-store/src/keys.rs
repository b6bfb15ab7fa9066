//! Key encoding for the region tables.
//!
//! Keys are big-endian so LMDB's byte order matches numeric order, and every
//! child row starts with its region id so one range covers a whole region.
//!
//! # Key Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  RegionKey (8 bytes)                                       │
//! ├────────────────────────────────────────────────────────────┤
//! │  region: u64 BE       (8 bytes) - Region id                │
//! └────────────────────────────────────────────────────────────┘
//! ┌────────────────────────────────────────────────────────────┐
//! │  ChildKey (12 bytes)                                       │
//! ├────────────────────────────────────────────────────────────┤
//! │  region: u64 BE       (8 bytes) - Owning region id         │
//! │  row: u32 BE          (4 bytes) - Position within region   │
//! └────────────────────────────────────────────────────────────┘
//! ```

use bytemuck::{Pod, Zeroable};
use claims_core::RegionId;

use crate::error::{StoreError, StoreResult};

/// Key of a region header row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RegionKey {
    region: [u8; 8],
}

impl RegionKey {
    #[inline]
    #[must_use]
    pub const fn new(id: RegionId) -> Self {
        Self {
            region: id.0.to_be_bytes(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> RegionId {
        RegionId(u64::from_be_bytes(self.region))
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Decode a stored key, reporting `table` on a length mismatch.
    pub fn decode(table: &'static str, bytes: &[u8]) -> StoreResult<Self> {
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| StoreError::CorruptKey {
            table,
            len: bytes.len(),
        })
    }
}

/// Key of a cell, flag, or member row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct ChildKey {
    region: [u8; 8],
    row: [u8; 4],
}

impl ChildKey {
    #[inline]
    #[must_use]
    pub const fn new(id: RegionId, row: u32) -> Self {
        Self {
            region: id.0.to_be_bytes(),
            row: row.to_be_bytes(),
        }
    }

    /// First and last possible key of region `id`.
    #[inline]
    #[must_use]
    pub const fn span(id: RegionId) -> (Self, Self) {
        (Self::new(id, 0), Self::new(id, u32::MAX))
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> RegionId {
        RegionId(u64::from_be_bytes(self.region))
    }

    #[inline]
    #[must_use]
    pub const fn row(&self) -> u32 {
        u32::from_be_bytes(self.row)
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn decode(table: &'static str, bytes: &[u8]) -> StoreResult<Self> {
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| StoreError::CorruptKey {
            table,
            len: bytes.len(),
        })
    }
}
