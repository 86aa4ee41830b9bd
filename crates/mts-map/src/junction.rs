//! The `Junction` entity: a node where roads meet, with its driving-lane
//! groups, available signal phases, and optional fixed program.

use std::collections::HashMap;

use mts_core::{JunctionId, LaneId, LightState, RoadId};

// ── Signal program data ───────────────────────────────────────────────────────

/// One phase of a fixed signal program.  `states` is aligned with the
/// junction's lane order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgramPhase {
    pub states: Vec<LightState>,
    pub duration: f64,
}

/// A fixed signal program: phases cycled in order.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LightProgram {
    pub phases: Vec<ProgramPhase>,
}

// ── LaneGroup ─────────────────────────────────────────────────────────────────

/// The lanes inside a junction connecting one (in-road, out-road) pair, with
/// their pre-lanes on the in road, both left to right.
#[derive(Clone, Debug)]
pub struct LaneGroup {
    pub in_road: RoadId,
    pub out_road: RoadId,
    /// Connecting lanes inside the junction.
    pub lanes: Vec<LaneId>,
    /// `pre_lanes[i]` is the unique predecessor of `lanes[i]`, on `in_road`.
    pub pre_lanes: Vec<LaneId>,
}

// ── Junction ──────────────────────────────────────────────────────────────────

/// A node where roads meet.
pub struct Junction {
    pub(crate) id: JunctionId,
    /// All lanes inside the junction, in signal-program order.
    pub(crate) lanes: Vec<LaneId>,
    /// Driving lanes inside the junction.
    pub(crate) driving_lanes: Vec<LaneId>,
    pub(crate) groups: Vec<LaneGroup>,
    /// `(in_road, out_road)` → index into `groups`.
    pub(crate) group_index: HashMap<(RoadId, RoadId), usize>,
    /// Available phases for the Max-Pressure controller.
    pub(crate) phases: Vec<Vec<LightState>>,
    /// Optional fixed program.
    pub(crate) fixed_program: Option<LightProgram>,
}

impl Junction {
    #[inline]
    pub fn id(&self) -> JunctionId {
        self.id
    }

    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    pub fn driving_lanes(&self) -> &[LaneId] {
        &self.driving_lanes
    }

    pub fn groups(&self) -> &[LaneGroup] {
        &self.groups
    }

    /// The driving-lane group connecting `in_road` to `out_road`.
    pub fn driving_lane_group(&self, in_road: RoadId, out_road: RoadId) -> Option<&LaneGroup> {
        self.group_index
            .get(&(in_road, out_road))
            .map(|&i| &self.groups[i])
    }

    pub fn phases(&self) -> &[Vec<LightState>] {
        &self.phases
    }

    pub fn fixed_program(&self) -> Option<&LightProgram> {
        self.fixed_program.as_ref()
    }
}
