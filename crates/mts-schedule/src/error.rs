use mts_core::{AoiId, LaneId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("trip has no end position")]
    NoEndPosition,

    #[error("aoi {0} has no driving gates")]
    NoDrivingGates(AoiId),

    #[error("aoi {0} has no walking gates")]
    NoWalkingGates(AoiId),

    #[error("lane {0} is not a driving lane")]
    NotDrivingLane(LaneId),

    #[error("lane {0} is not a walking lane")]
    NotWalkingLane(LaneId),

    #[error("no such lane {0}")]
    UnknownLane(LaneId),

    #[error("no such aoi {0}")]
    UnknownAoi(AoiId),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
