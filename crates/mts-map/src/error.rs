use mts_core::{CoreError, JunctionId, LaneId, RoadId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("lane {0} has no parent road or junction")]
    NoParent(LaneId),

    #[error("lane {0} was assigned more than one parent")]
    BothParents(LaneId),

    #[error("road {road} has no lanes")]
    EmptyRoad { road: RoadId },

    #[error("road {road} {side} junction is not unique: {a} vs {b}")]
    AmbiguousRoadJunction {
        road: RoadId,
        side: &'static str,
        a: JunctionId,
        b: JunctionId,
    },

    #[error("road {road} lane {lane}'s {side} lane {other} is not in a junction")]
    NonJunctionNeighbor {
        road: RoadId,
        lane: LaneId,
        side: &'static str,
        other: LaneId,
    },

    #[error("junction lane {lane} must have exactly one predecessor and successor (got {preds} and {succs})")]
    AmbiguousJunctionLane {
        lane: LaneId,
        preds: usize,
        succs: usize,
    },

    #[error("junction {junction} group lane {lane}: pre-lane {pre} is not on in-road {in_road}")]
    PreLaneOffRoad {
        junction: JunctionId,
        lane: LaneId,
        pre: LaneId,
        in_road: RoadId,
    },

    #[error("junction {junction} phase {phase} has {got} states for {expected} lanes")]
    PhaseLaneCountMismatch {
        junction: JunctionId,
        phase: usize,
        got: usize,
        expected: usize,
    },

    #[error("aoi gate lane {lane} has the wrong kind for a {gate} gate")]
    BadGateLane { lane: LaneId, gate: &'static str },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type MapResult<T> = Result<T, MapError>;
