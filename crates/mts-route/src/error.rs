use mts_core::{AoiId, LaneId, RoadId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no route between the requested positions")]
    NoRoute,

    #[error("journey is empty")]
    EmptyJourney,

    #[error("journey type does not match the requested mode")]
    WrongJourneyType,

    #[error("roads {a} and {b} are not connected by a junction lane group")]
    RoadsNotConnected { a: RoadId, b: RoadId },

    #[error("journey's last road {road} does not contain the trip end lane {lane}")]
    EndMismatch { road: RoadId, lane: LaneId },

    #[error("aoi {aoi} has no gate on road {road}")]
    NoGateOnRoad { aoi: AoiId, road: RoadId },

    #[error("aoi {aoi} has no gate on lane {lane}")]
    NoGateOnLane { aoi: AoiId, lane: LaneId },

    #[error("position has neither lane nor aoi")]
    EmptyPosition,
}

pub type RouteResult<T> = Result<T, RouteError>;
