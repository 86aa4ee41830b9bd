//! The per-person runtime state and its double buffer.
//!
//! Every person carries two copies of [`Runtime`]: the working `runtime`
//! written during *update*, and the `snapshot` committed during *prepare*.
//! Cross-agent reads always hit the snapshot, so parallel updates observe a
//! consistent previous step regardless of scheduling.

use mts_core::geom::Point;
use mts_core::{AoiId, LaneId};

/// Lane-change completion below this ratio keeps the vehicle occupying the
/// shadow lane.
pub const LC_IN_OLD_LANE_RATIO: f64 = 0.5;

// ── Status ────────────────────────────────────────────────────────────────────

/// Lifecycle state of a person.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Status {
    #[default]
    Sleep,
    WaitRoute,
    Walking,
    Driving,
    Passenger,
}

// ── LcState ───────────────────────────────────────────────────────────────────

/// State of an in-progress lane change.
///
/// The *shadow* lane is the lane being left; the vehicle keeps a node there
/// until the change passes the halfway ratio.
#[derive(Copy, Clone, Debug, Default)]
pub struct LcState {
    pub is_lc: bool,
    pub shadow_lane: Option<LaneId>,
    /// Arc position projected onto the shadow lane.
    pub shadow_s: f64,
    /// Heading offset from the lane direction (radians, ≥ 0).
    pub yaw: f64,
    /// Fraction of the lateral movement completed, in `[0, 1)`.
    pub completed_ratio: f64,
}

impl LcState {
    /// `true` while the vehicle still occupies the shadow lane.
    #[inline]
    pub fn in_shadow_lane(&self) -> bool {
        self.is_lc && self.completed_ratio < LC_IN_OLD_LANE_RATIO
    }

    /// Begin a change whose shadow is `shadow_lane`.
    pub fn begin(shadow_lane: LaneId, shadow_s: f64) -> Self {
        Self {
            is_lc: true,
            shadow_lane: Some(shadow_lane),
            shadow_s,
            yaw: 0.0,
            completed_ratio: 0.0,
        }
    }
}

// ── Action ────────────────────────────────────────────────────────────────────

/// The combined decision of one step of the vehicle controller.
#[derive(Copy, Clone, Debug)]
pub struct Action {
    /// Commanded acceleration (m/s²).
    pub a: f64,
    /// Lane-change target, if any.
    pub lc_target: Option<LaneId>,
    /// Front-wheel steering angle for the change (radians).
    pub lc_phi: f64,
    /// Distance to the perceived leader (m); -1 when none.
    pub ahead_distance: f64,
}

impl Default for Action {
    fn default() -> Self {
        Self {
            a: f64::INFINITY,
            lc_target: None,
            lc_phi: 0.0,
            ahead_distance: -1.0,
        }
    }
}

impl Action {
    /// Merge another decision: the most conservative acceleration wins, the
    /// first lane-change target sticks (a second one is a logic error).
    pub fn merge(&mut self, other: Action) {
        if other.a < self.a {
            self.a = other.a;
        }
        if let Some(target) = other.lc_target {
            if self.lc_target.is_some() {
                tracing::error!("start lane change conflict");
            }
            self.lc_target = Some(target);
            self.lc_phi = other.lc_phi;
        }
    }

    /// Command a lane change toward `target` with steering angle `phi`.
    pub fn start_lane_change(&mut self, target: LaneId, phi: f64) {
        self.lc_target = Some(target);
        self.lc_phi = phi;
    }
}

// ── Runtime ───────────────────────────────────────────────────────────────────

/// A person's mutable state.  Plain `Copy` data so the snapshot swap is a
/// structure assignment with no shared ownership.
#[derive(Copy, Clone, Debug)]
pub struct Runtime {
    pub status: Status,
    /// Whether the previous step ended the current trip.
    pub is_trip_end: bool,

    pub xyz: Point,
    /// Speed (m/s).
    pub v: f64,
    /// Current lane, exclusive with `aoi` except during departure/arrival.
    pub lane: Option<LaneId>,
    /// Arc position on `lane` (m).
    pub s: f64,
    /// Current AOI, exclusive with `lane`.
    pub aoi: Option<AoiId>,

    /// The last vehicle decision.
    pub action: Action,
    /// Lane-change state, meaningful only while `lc.is_lc`.
    pub lc: LcState,

    /// Pedestrian walking direction on the current segment.
    pub is_forward: bool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            status: Status::Sleep,
            is_trip_end: true,
            xyz: Point::default(),
            v: 0.0,
            lane: None,
            s: 0.0,
            aoi: None,
            action: Action::default(),
            lc: LcState::default(),
            is_forward: true,
        }
    }
}

impl Runtime {
    /// Drop any in-progress lane change.
    #[inline]
    pub fn clear_lane_change(&mut self) {
        self.lc = LcState::default();
    }
}
