//! Chunk claims for a multiplayer voxel world.
//!
//! Players claim 16×16 cells, group them into regions, grant other players
//! graded trust, and toggle per-region protection flags. Every protected
//! world action asks the service whether it may happen.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ClaimService                                                       │
//! │    - claim / expand / unclaim / delete / trust / set_flag           │
//! │    - can_act / handle(ProtectionEvent) on the hot path              │
//! └─────────────────────────────────────────────────────────────────────┘
//!            │ write lock                          │ Arc<Region> snapshots
//!            ▼                                     ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────────┐
//! │  SpatialIndex                │   │  RegionSink                      │
//! │    - cell → region           │   │    - save / delete               │
//! │    - owner → regions         │   │    - implemented by the store    │
//! │    - id → Arc<Region>        │   └──────────────────────────────────┘
//! └──────────────────────────────┘
//! ```
//!
//! Lookups take a read lock and never touch I/O. Mutations run their checks,
//! their index edits and the hand-off to the sink under one write lock, then
//! wait for the write with the lock released.

pub mod cell;
pub mod config;
pub mod error;
pub mod event;
pub mod flag;
pub mod growth;
pub mod index;
pub mod permission;
pub mod provider;
pub mod region;
pub mod service;
pub mod trust;

pub use cell::{Bounds, CELL_SIZE, CellPos, WorldId};
pub use config::{ClaimsConfig, ProtectionConfig, TrustLevelsConfig};
pub use error::{ClaimError, ClaimResult, Missing, PersistError, Quota};
pub use event::{Environment, InteractTarget, ProtectionEvent, Verdict};
pub use flag::{Flag, FlagInfo, FlagSet, FlagValues};
pub use growth::{ClaimOutcome, GrowthPolicy};
pub use index::{ReplaceReport, SpatialIndex, Unbound};
pub use permission::{Actor, ExplosionRule};
pub use provider::{
    CoordinateProvider, GridCoordinates, IdentityProvider, LoadedRegions, NullSink, Position,
    Receipt, RegionSink, RegionSource,
};
pub use region::{Member, PlayerId, Profile, Region, RegionId, RegionParts};
pub use service::{ClaimService, ClaimStats};
pub use trust::{TrustLevel, TrustPermissions};
