//! Wire-level routing types shared between the router and its consumers.

use mts_core::{AoiId, LaneId, RoadId};

// ── Positions ─────────────────────────────────────────────────────────────────

/// A position as referenced in a routing request or a schedule: either a
/// point on a lane or an AOI.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PositionSpec {
    Lane { lane: LaneId, s: f64 },
    Aoi(AoiId),
}

/// A resolved route endpoint.  Starts as lane+s or AOI; the AOI's gate lane
/// and arc position are filled in once the journey is known.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct RoutePosition {
    pub lane: Option<LaneId>,
    pub s: f64,
    pub aoi: Option<AoiId>,
}

impl RoutePosition {
    pub fn at_lane(lane: LaneId, s: f64) -> Self {
        Self { lane: Some(lane), s, aoi: None }
    }

    pub fn at_aoi(aoi: AoiId) -> Self {
        Self { lane: None, s: 0.0, aoi: Some(aoi) }
    }

    pub fn spec(&self) -> PositionSpec {
        match (self.lane, self.aoi) {
            (Some(lane), _) => PositionSpec::Lane { lane, s: self.s },
            (None, Some(aoi)) => PositionSpec::Aoi(aoi),
            (None, None) => panic!("route position with neither lane nor aoi"),
        }
    }
}

// ── Journeys ──────────────────────────────────────────────────────────────────

/// Direction of travel along a walking lane.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MovingDirection {
    Forward,
    Backward,
}

/// One stretch of a pedestrian journey.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WalkSegment {
    pub lane: LaneId,
    pub direction: MovingDirection,
}

/// A single-mode leg of a route.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Journey {
    /// Drive along the given roads in order.
    Driving { roads: Vec<RoadId>, eta: f64 },
    /// Walk along the given segments in order.
    Walking { segments: Vec<WalkSegment>, eta: f64 },
}

// ── Request / response ────────────────────────────────────────────────────────

/// Transport mode of a routing request.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RouteMode {
    Drive,
    Walk,
    Bus,
    Subway,
    Taxi,
}

#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteRequest {
    pub start: PositionSpec,
    pub end: PositionSpec,
    /// Simulated departure time (s).
    pub time: f64,
    pub mode: RouteMode,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteResponse {
    pub journeys: Vec<Journey>,
}
