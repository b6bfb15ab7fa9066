//! Claim error types.

use core::fmt;

use thiserror::Error;

/// Which quota a request ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quota {
    /// Maximum regions per owner.
    Regions,
    /// Maximum cells per region.
    Cells,
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Regions => "regions per owner",
            Self::Cells => "cells per region",
        })
    }
}

/// What a lookup failed to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Missing {
    Region,
    Member,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Region => "region",
            Self::Member => "member",
        })
    }
}

/// A durable write that did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("persistence failure: {0}")]
pub struct PersistError(pub String);

impl PersistError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// Claim error type.
///
/// Everything except [`ClaimError::Persistence`] is an expected business-rule
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The cell already belongs to a region.
    #[error("cell is already claimed")]
    AlreadyClaimed,

    /// The cell does not touch any region the owner could grow.
    #[error("cell is not adjacent to an existing claim")]
    NotAdjacent,

    /// A configured quota is exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(Quota),

    /// The actor neither owns the region nor holds bypass.
    #[error("not the owner of this claim")]
    NotOwner,

    /// Region or member lookup failed.
    #[error("{0} not found")]
    NotFound(Missing),

    /// The cell is not part of any region.
    #[error("cell is not claimed")]
    NotClaimed,

    /// Unknown flag key.
    #[error("unknown flag: {0}")]
    InvalidFlag(String),

    /// Unknown trust level name.
    #[error("unknown trust level: {0}")]
    InvalidTrustLevel(String),

    /// Player name did not resolve to an identity.
    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    /// Regions have not been loaded yet.
    #[error("claims are still loading")]
    Loading,

    /// Durable write failed after the in-memory state advanced.
    #[error(transparent)]
    Persistence(#[from] PersistError),
}

/// Result type for claim operations.
pub type ClaimResult<T> = Result<T, ClaimError>;
