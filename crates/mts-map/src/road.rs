//! The `Road` entity: a contiguous stretch of lanes between two junctions.

use mts_core::{JunctionId, LaneId, RoadId};

use crate::lane::{Lane, LaneKind};

/// A road: ordered lanes (left to right) between two junctions.
pub struct Road {
    pub(crate) id: RoadId,
    pub(crate) name: String,
    /// All lanes, left to right.
    pub(crate) lanes: Vec<LaneId>,
    /// Driving lanes, left to right.
    pub(crate) driving_lanes: Vec<LaneId>,
    /// Walking lanes, left to right.
    pub(crate) walking_lanes: Vec<LaneId>,
    /// The junction vehicles come from.  Unique by validation.
    pub(crate) predecessor: Option<JunctionId>,
    /// The junction vehicles leave into.  Unique by validation.
    pub(crate) successor: Option<JunctionId>,
    /// Average design max-speed over the driving lanes (m/s).
    pub(crate) max_v: f64,
    /// Average driving-lane length (m).
    pub(crate) avg_driving_len: f64,
}

impl Road {
    #[inline]
    pub fn id(&self) -> RoadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    pub fn driving_lanes(&self) -> &[LaneId] {
        &self.driving_lanes
    }

    pub fn walking_lanes(&self) -> &[LaneId] {
        &self.walking_lanes
    }

    pub fn contains(&self, lane: LaneId) -> bool {
        self.lanes.contains(&lane)
    }

    /// The rightmost driving lane — the canonical road-end target.
    ///
    /// # Panics
    /// Panics if the road has no driving lanes (ruled out at build time).
    pub fn rightmost_driving_lane(&self) -> LaneId {
        *self
            .driving_lanes
            .last()
            .unwrap_or_else(|| panic!("{}: no driving lanes", self.id))
    }

    pub fn predecessor(&self) -> Option<JunctionId> {
        self.predecessor
    }

    pub fn successor(&self) -> Option<JunctionId> {
        self.successor
    }

    /// Average design max-speed over the driving lanes (m/s).
    #[inline]
    pub fn max_v(&self) -> f64 {
        self.max_v
    }

    /// Average driving-lane length (m).
    #[inline]
    pub fn avg_driving_len(&self) -> f64 {
        self.avg_driving_len
    }

    /// Project a walking-lane position onto the rightmost driving lane.
    ///
    /// # Panics
    /// Panics if `walking_lane` is not a walking lane of this road.
    pub fn project_to_driving_lane(&self, lanes: &[Lane], walking_lane: LaneId, s: f64) -> (LaneId, f64) {
        let from = &lanes[walking_lane.index()];
        assert_eq!(from.parent_road(), Some(self.id), "{}: lane {walking_lane} not in road", self.id);
        assert_eq!(from.kind(), LaneKind::Walking, "{walking_lane}: not a walking lane");
        let target = self.rightmost_driving_lane();
        let target_lane = &lanes[target.index()];
        (target, target_lane.project_from(from, s))
    }

    /// Project a driving-lane position onto the first walking lane, if the
    /// road has one.
    ///
    /// # Panics
    /// Panics if `driving_lane` is not a driving lane of this road.
    pub fn project_to_walking_lane(&self, lanes: &[Lane], driving_lane: LaneId, s: f64) -> Option<(LaneId, f64)> {
        let from = &lanes[driving_lane.index()];
        assert_eq!(from.parent_road(), Some(self.id), "{}: lane {driving_lane} not in road", self.id);
        assert_eq!(from.kind(), LaneKind::Driving, "{driving_lane}: not a driving lane");
        let target = *self.walking_lanes.first()?;
        let target_lane = &lanes[target.index()];
        Some((target, target_lane.project_from(from, s)))
    }
}
