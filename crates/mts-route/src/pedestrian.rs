//! The pedestrian route: an ordered list of directed walking segments.

use mts_map::MapData;

use crate::error::{RouteError, RouteResult};
use crate::types::{MovingDirection, RoutePosition, WalkSegment};

/// A walking journey resolved against the map, with a cursor over its
/// segments.
#[derive(Clone, Debug)]
pub struct PedestrianRoute {
    pub start: RoutePosition,
    pub end: RoutePosition,
    segments: Vec<WalkSegment>,
    index: usize,
}

impl PedestrianRoute {
    /// Resolve a walking journey into a route.
    ///
    /// AOI endpoints are completed from their walking gate on the journey's
    /// first/last lane; a missing gate means the schedule and the map
    /// disagree and the journey is rejected.
    pub fn from_journey(
        map: &MapData,
        segments: Vec<WalkSegment>,
        mut start: RoutePosition,
        mut end: RoutePosition,
    ) -> RouteResult<Self> {
        if segments.is_empty() {
            return Err(RouteError::EmptyJourney);
        }
        if start.lane.is_none() {
            let aoi = start.aoi.ok_or(RouteError::EmptyPosition)?;
            let lane = segments[0].lane;
            if !map.aoi(aoi).has_walking_gate(lane) {
                return Err(RouteError::NoGateOnLane { aoi, lane });
            }
            start.lane = Some(lane);
            start.s = map.aoi(aoi).gate_s(lane);
        }
        if end.lane.is_none() {
            let aoi = end.aoi.ok_or(RouteError::EmptyPosition)?;
            let lane = segments.last().expect("non-empty").lane;
            if !map.aoi(aoi).has_walking_gate(lane) {
                return Err(RouteError::NoGateOnLane { aoi, lane });
            }
            end.lane = Some(lane);
            end.s = map.aoi(aoi).gate_s(lane);
        }
        Ok(Self { start, end, segments, index: 0 })
    }

    /// The segment being walked.
    pub fn current(&self) -> WalkSegment {
        self.segments[self.index]
    }

    /// `true` when the cursor is on the final segment.
    pub fn at_last(&self) -> bool {
        self.index + 1 >= self.segments.len()
    }

    /// The segment after the current one, if any.
    pub fn peek_next(&self) -> Option<WalkSegment> {
        self.segments.get(self.index + 1).copied()
    }

    /// The final segment.
    pub fn last(&self) -> WalkSegment {
        *self.segments.last().expect("non-empty")
    }

    /// Advance the cursor.  Returns `false` (cursor pinned to the last
    /// segment) when the route is already exhausted.
    pub fn step(&mut self) -> bool {
        self.index += 1;
        if self.index >= self.segments.len() {
            self.index = self.segments.len() - 1;
            return false;
        }
        true
    }

    pub fn segments(&self) -> &[WalkSegment] {
        &self.segments
    }
}

impl WalkSegment {
    #[inline]
    pub fn is_forward(&self) -> bool {
        self.direction == MovingDirection::Forward
    }
}
