//! Base error type.
//!
//! Sub-crates define their own error enums and either convert `CoreError`
//! into them via `From` or wrap it as a variant.  Arena lookups that are
//! expected to succeed by construction index directly (and so abort on a
//! corrupt id); every lookup that may legitimately miss has a `*_or_err`
//! twin returning one of these variants.

use thiserror::Error;

use crate::{AoiId, JunctionId, LaneId, PersonId, RoadId};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no lane {0}")]
    UnknownLane(LaneId),

    #[error("no road {0}")]
    UnknownRoad(RoadId),

    #[error("no junction {0}")]
    UnknownJunction(JunctionId),

    #[error("no aoi {0}")]
    UnknownAoi(AoiId),

    #[error("no person {0}")]
    UnknownPerson(PersonId),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
