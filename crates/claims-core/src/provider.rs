//! Collaborator interfaces the host implements.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::cell::{CellPos, WorldId};
use crate::error::PersistError;
use crate::region::{PlayerId, Profile, Region, RegionId};

/// Resolves players for the command layer.
pub trait IdentityProvider: Send + Sync {
    /// Online player with this name, case-insensitive.
    fn find_online(&self, name: &str) -> Option<Profile>;

    /// Whether the player holds the externally granted bypass capability.
    fn has_bypass(&self, player: PlayerId) -> bool;
}

/// A block-space position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Maps between world positions and cells.
pub trait CoordinateProvider: Send + Sync {
    fn cell_at(&self, world: &WorldId, x: f64, z: f64) -> CellPos;

    /// A position inside `cell` where a player can stand.
    fn safe_position(&self, cell: &CellPos) -> Position;
}

/// 16×16 grid coordinates with a fixed standing height.
#[derive(Clone, Copy, Debug)]
pub struct GridCoordinates {
    pub surface_y: f64,
}

impl Default for GridCoordinates {
    fn default() -> Self {
        Self { surface_y: 64.0 }
    }
}

impl CoordinateProvider for GridCoordinates {
    fn cell_at(&self, world: &WorldId, x: f64, z: f64) -> CellPos {
        CellPos::from_block(world.clone(), x.floor() as i32, z.floor() as i32)
    }

    fn safe_position(&self, cell: &CellPos) -> Position {
        let (x, z) = cell.center_block();
        Position {
            x: x as f64 + 0.5,
            y: self.surface_y + 1.0,
            z: z as f64 + 0.5,
        }
    }
}

/// Completion of one write accepted by a [`RegionSink`].
#[must_use]
#[derive(Debug)]
pub struct Receipt(Option<Receiver<Result<(), PersistError>>>);

impl Receipt {
    /// The write is already durable, or its outcome is not reported back.
    pub const fn done() -> Self {
        Self(None)
    }

    /// The write completes when the writer answers on `reply`.
    pub const fn pending(reply: Receiver<Result<(), PersistError>>) -> Self {
        Self(Some(reply))
    }

    /// Block until the write is durable.
    pub fn wait(self) -> Result<(), PersistError> {
        match self.0 {
            None => Ok(()),
            Some(reply) => reply
                .recv()
                .unwrap_or_else(|_| Err(PersistError::new("writer stopped before the write completed"))),
        }
    }
}

/// Where region writes go.
///
/// `save` and `delete` are called with the index lock held, so a sink sees
/// writes in exactly the order the index changed. They must only accept the
/// write and never block on I/O; a sink that writes synchronously hands back
/// a pending [`Receipt`] that the caller waits on after releasing the lock.
pub trait RegionSink: Send + Sync {
    fn save(&self, region: Arc<Region>) -> Result<Receipt, PersistError>;

    fn delete(&self, id: RegionId) -> Result<Receipt, PersistError>;

    /// Block until every write accepted so far is durable.
    fn flush(&self) -> Result<(), PersistError> {
        Ok(())
    }
}

/// Regions read back from durable storage.
#[derive(Debug, Default)]
pub struct LoadedRegions {
    /// Ordered by ascending id.
    pub regions: Vec<Region>,
    /// First id that has never been handed out.
    pub next_id: u64,
}

/// Source of the startup load.
pub trait RegionSource: Send + Sync {
    fn load_all(&self) -> Result<LoadedRegions, PersistError>;
}

/// Sink that drops every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RegionSink for NullSink {
    fn save(&self, _region: Arc<Region>) -> Result<Receipt, PersistError> {
        Ok(Receipt::done())
    }

    fn delete(&self, _id: RegionId) -> Result<Receipt, PersistError> {
        Ok(Receipt::done())
    }
}
