//! LMDB persistence for claim regions.
//!
//! Regions live in four named databases inside one LMDB environment:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  regions   RegionKey(id)        → RegionRecord (owner, world, name) │
//! │  cells     ChildKey(id, row)    → CellRecord                        │
//! │  flags     ChildKey(id, row)    → FlagRecord (explicit values only) │
//! │  members   ChildKey(id, row)    → MemberRecord                      │
//! │  meta      "next_id"            → u64                               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ClaimDb`] reads and writes those tables and migrates the flat legacy
//! schema once. [`SaveQueue`] puts writes on a background thread and is the
//! [`claims_core::RegionSink`] the service talks to.

pub mod db;
pub mod error;
pub mod keys;
pub mod migrate;
pub mod queue;
pub mod records;

pub use db::ClaimDb;
pub use error::{StoreError, StoreResult};
pub use keys::{ChildKey, RegionKey};
pub use migrate::{Migration, MigrationReport};
pub use queue::{SaveMode, SaveQueue};
