//! The `Lane` entity: a directed strip with polyline geometry, ordered agent
//! queues, connection topology, and the per-step light target.

use mts_core::geom::{self, Point};
use mts_core::{AoiId, JunctionId, LaneId, LightState, RoadId, Side};

use crate::queue::{LaneQueue, NodeRef, SideLinks};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Lane *prepare* over the whole arena: commit speed buffers and resolve
/// queue membership, then rebuild the cross-lane neighbor links against the
/// resorted queues (read-only computation, disjoint write-back).
pub fn prepare_all(lanes: &mut [Lane]) {
    #[cfg(feature = "parallel")]
    lanes.par_iter_mut().for_each(Lane::prepare);
    #[cfg(not(feature = "parallel"))]
    lanes.iter_mut().for_each(Lane::prepare);

    #[cfg(feature = "parallel")]
    let links: Vec<Vec<SideLinks>> = lanes
        .par_iter()
        .map(|l| l.compute_side_links(lanes))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let links: Vec<Vec<SideLinks>> = lanes
        .iter()
        .map(|l| l.compute_side_links(lanes))
        .collect();

    #[cfg(feature = "parallel")]
    lanes
        .par_iter_mut()
        .zip(links)
        .for_each(|(l, ls)| l.apply_side_links(ls));
    #[cfg(not(feature = "parallel"))]
    lanes
        .iter_mut()
        .zip(links)
        .for_each(|(l, ls)| l.apply_side_links(ls));
}

// ── Classification ────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneKind {
    Driving,
    Walking,
    Rail,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneTurn {
    #[default]
    Straight,
    Left,
    Right,
    Around,
}

/// A lane belongs to exactly one parent.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LaneParent {
    Road {
        road: RoadId,
        /// Index within the parent road, 0 = leftmost.
        offset: usize,
    },
    Junction(JunctionId),
}

/// A topological connection to another lane.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Connection {
    pub lane: LaneId,
}

/// A point where another lane crosses this one.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Overlap {
    /// Arc position of the crossing on this lane.
    pub self_s: f64,
    pub other: LaneId,
    /// Arc position of the crossing on the other lane.
    pub other_s: f64,
    /// Whether this lane has priority at the crossing.
    pub self_first: bool,
}

/// Light state with phase timing, written exactly once per step during
/// *prepare*.
#[derive(Copy, Clone, Debug)]
pub struct LightTiming {
    pub state: LightState,
    /// Total duration of the current phase for this lane (s).
    pub total: f64,
    /// Time until this lane's next state change (s).
    pub remaining: f64,
}

impl Default for LightTiming {
    fn default() -> Self {
        Self { state: LightState::Green, total: f64::INFINITY, remaining: f64::INFINITY }
    }
}

// ── Lane ──────────────────────────────────────────────────────────────────────

/// A directed 1-D strip of the network.
pub struct Lane {
    pub(crate) id: LaneId,
    pub(crate) kind: LaneKind,
    pub(crate) turn: LaneTurn,
    pub(crate) parent: LaneParent,

    /// Incoming connections, sorted ascending by lane id.
    pub(crate) predecessors: Vec<Connection>,
    /// Outgoing connections, sorted ascending by lane id.
    pub(crate) successors: Vec<Connection>,
    /// Cached single predecessor, set when `predecessors.len() == 1`.
    pub(crate) unique_predecessor: Option<LaneId>,
    /// Cached single successor, set when `successors.len() == 1`.
    pub(crate) unique_successor: Option<LaneId>,
    /// Left/right neighbor lanes, nearest first.
    pub(crate) side_lanes: [Vec<LaneId>; 2],
    /// Crossings with other lanes, sorted by `self_s`.
    pub(crate) overlaps: Vec<Overlap>,
    /// AOIs reachable from this lane.
    pub(crate) aois: Vec<AoiId>,

    pub(crate) line: Vec<Point>,
    pub(crate) line_lengths: Vec<f64>,
    pub(crate) line_directions: Vec<f64>,
    pub(crate) length: f64,
    pub(crate) width: f64,

    /// Committed speed limit (m/s).
    pub(crate) max_v: f64,
    /// Pending speed limit, committed at the next *prepare*.
    pub(crate) max_v_buffer: f64,

    pub(crate) light: LightTiming,

    /// Ordered vehicle sequence (driving lanes).
    pub vehicles: LaneQueue<SideLinks>,
    /// Ordered pedestrian sequence (walking lanes).
    pub pedestrians: LaneQueue<()>,
}

impl Lane {
    // ── Static data ───────────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> LaneId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> LaneKind {
        self.kind
    }

    #[inline]
    pub fn turn(&self) -> LaneTurn {
        self.turn
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn line(&self) -> &[Point] {
        &self.line
    }

    #[inline]
    pub fn line_lengths(&self) -> &[f64] {
        &self.line_lengths
    }

    pub fn parent(&self) -> LaneParent {
        self.parent
    }

    pub fn parent_road(&self) -> Option<RoadId> {
        match self.parent {
            LaneParent::Road { road, .. } => Some(road),
            LaneParent::Junction(_) => None,
        }
    }

    pub fn parent_junction(&self) -> Option<JunctionId> {
        match self.parent {
            LaneParent::Junction(j) => Some(j),
            LaneParent::Road { .. } => None,
        }
    }

    #[inline]
    pub fn in_road(&self) -> bool {
        matches!(self.parent, LaneParent::Road { .. })
    }

    #[inline]
    pub fn in_junction(&self) -> bool {
        matches!(self.parent, LaneParent::Junction(_))
    }

    /// Index within the parent road, 0 = leftmost.
    ///
    /// # Panics
    /// Panics if the lane is inside a junction.
    pub fn offset_in_road(&self) -> usize {
        match self.parent {
            LaneParent::Road { offset, .. } => offset,
            LaneParent::Junction(_) => panic!("{}: not in a road", self.id),
        }
    }

    pub fn predecessors(&self) -> &[Connection] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[Connection] {
        &self.successors
    }

    /// The single predecessor of a junction-internal driving lane.
    pub fn unique_predecessor(&self) -> Option<LaneId> {
        self.unique_predecessor
    }

    /// The single successor of a junction-internal driving lane.
    pub fn unique_successor(&self) -> Option<LaneId> {
        self.unique_successor
    }

    /// Nearest neighbor lane on `side`, if any.
    pub fn neighbor(&self, side: Side) -> Option<LaneId> {
        self.side_lanes[side.index()].first().copied()
    }

    pub fn side_lanes(&self, side: Side) -> &[LaneId] {
        &self.side_lanes[side.index()]
    }

    pub fn overlaps(&self) -> &[Overlap] {
        &self.overlaps
    }

    pub fn aois(&self) -> &[AoiId] {
        &self.aois
    }

    #[inline]
    pub fn is_walking(&self) -> bool {
        self.kind == LaneKind::Walking
    }

    #[inline]
    pub fn is_right_turn_driving(&self) -> bool {
        self.kind == LaneKind::Driving && self.turn == LaneTurn::Right
    }

    // ── Light and speed limit ─────────────────────────────────────────────

    /// Current light state with total and remaining phase time.
    #[inline]
    pub fn light(&self) -> LightTiming {
        self.light
    }

    /// Write the light state.  Called exactly once per lane per step, during
    /// *prepare*, by the parent junction's controller.
    pub fn set_light(&mut self, state: LightState, total: f64, remaining: f64) {
        self.light = LightTiming { state, total, remaining };
    }

    /// `true` if the lane may not be entered (junction lane, not green).
    #[inline]
    pub fn is_no_entry(&self) -> bool {
        self.in_junction() && self.light.state != LightState::Green
    }

    /// Committed speed limit (m/s).
    #[inline]
    pub fn max_v(&self) -> f64 {
        self.max_v
    }

    /// Buffer a new speed limit; committed at the next *prepare*.
    pub fn set_max_v(&mut self, v: f64) {
        self.max_v_buffer = v;
    }

    // ── Geometry ──────────────────────────────────────────────────────────

    /// World position at arc position `s`.
    pub fn position_at(&self, s: f64) -> Point {
        if s < 0.0 || s > self.length {
            tracing::debug!("{}: arc position {s} outside [0, {}]", self.id, self.length);
        }
        geom::position_at(&self.line, &self.line_lengths, s)
    }

    /// Heading (radians) at arc position `s`.
    pub fn direction_at(&self, s: f64) -> f64 {
        geom::direction_at(&self.line_directions, &self.line_lengths, s)
    }

    /// World position at arc position `s`, shifted `offset` metres to the
    /// right of travel.
    pub fn offset_position_at(&self, s: f64, offset: f64) -> Point {
        geom::offset_position_at(&self.line, &self.line_lengths, &self.line_directions, s, offset)
    }

    /// Arc position of the closest point on this lane to `pos`.
    pub fn project_point(&self, pos: Point) -> f64 {
        geom::project_to_polyline(&self.line, &self.line_lengths, pos).clamp(0.0, self.length)
    }

    /// Proportionally project an arc position from a lane of the same road
    /// onto this one.
    pub fn project_from(&self, other: &Lane, other_s: f64) -> f64 {
        debug_assert_eq!(self.parent_road(), other.parent_road(), "projection across roads");
        (other_s / other.length * self.length).clamp(0.0, self.length)
    }

    // ── Prepare-phase maintenance ─────────────────────────────────────────

    /// First prepare pass: commit the speed-limit buffer and resolve the
    /// queue membership buffers.
    pub fn prepare(&mut self) {
        self.max_v = self.max_v_buffer;
        self.vehicles.prepare();
        self.vehicles.clear_extras();
        self.pedestrians.prepare();
    }

    /// Second prepare pass, driving lanes only: compute this lane's
    /// cross-lane neighbor links against the already-resorted neighbor
    /// queues.
    ///
    /// The comparison uses the normalized key `s / length` so lanes of
    /// different length align proportionally.  Runs read-only; the result is
    /// written back by [`apply_side_links`](Self::apply_side_links).
    pub fn compute_side_links(&self, lanes: &[Lane]) -> Vec<SideLinks> {
        let mut links = vec![SideLinks::default(); self.vehicles.len()];
        if self.kind != LaneKind::Driving {
            return links;
        }
        for side in Side::BOTH {
            let Some(neighbor_id) = self.neighbor(side) else {
                continue;
            };
            let neighbor = &lanes[neighbor_id.index()];
            if neighbor.vehicles.is_empty() {
                continue;
            }
            let inv_len = 1.0 / self.length;
            let n_inv_len = 1.0 / neighbor.length;
            let mut back: Option<u32> = None;
            let mut front: usize = 0;
            for (i, node) in self.vehicles.iter().enumerate() {
                let ratio = node.s * inv_len;
                while front < neighbor.vehicles.len()
                    && neighbor.vehicles.get(front).expect("in range").s * n_inv_len < ratio
                {
                    back = Some(front as u32);
                    front += 1;
                }
                links[i][side.index()][0] =
                    back.map(|index| NodeRef { lane: neighbor_id, index });
                links[i][side.index()][1] = (front < neighbor.vehicles.len())
                    .then_some(NodeRef { lane: neighbor_id, index: front as u32 });
            }
        }
        links
    }

    /// Write back links produced by [`compute_side_links`](Self::compute_side_links).
    pub fn apply_side_links(&mut self, links: Vec<SideLinks>) {
        debug_assert_eq!(links.len(), self.vehicles.len());
        for (node, l) in self.vehicles.nodes_mut().iter_mut().zip(links) {
            node.extra = l;
        }
    }

    // ── Signal-control queries ────────────────────────────────────────────

    /// Net demand differential used by the Max-Pressure controller.
    ///
    /// Density on the unique predecessor minus density on the unique
    /// successor, each normalized by the branching factor.  Lanes shorter
    /// than 10 m aggregate one more hop so vehicles stuck across the short
    /// stretch still count.  Right-turn and walking lanes contribute zero.
    ///
    /// # Panics
    /// Panics if the predecessor or successor is not unique — junction
    /// driving lanes are validated to have both at build time.
    pub fn pressure(&self, lanes: &[Lane]) -> f64 {
        if self.kind == LaneKind::Walking || self.turn == LaneTurn::Right {
            return 0.0;
        }
        let pre_id = self
            .unique_predecessor
            .unwrap_or_else(|| panic!("{}: predecessor is not unique", self.id));
        let suc_id = self
            .unique_successor
            .unwrap_or_else(|| panic!("{}: successor is not unique", self.id));

        let pre = &lanes[pre_id.index()];
        let mut incoming = if pre.length > 10.0 {
            pre.vehicles.len() as f64 / pre.length
        } else {
            let mut total_len = pre.length;
            let mut total_count = pre.vehicles.len();
            for conn in &pre.predecessors {
                let lane = &lanes[conn.lane.index()];
                total_len += lane.length;
                total_count += lane.vehicles.len();
            }
            total_count as f64 / total_len
        };
        incoming /= pre.successors.len().max(1) as f64;

        let suc = &lanes[suc_id.index()];
        let mut outgoing = if suc.length > 10.0 {
            suc.vehicles.len() as f64 / suc.length
        } else {
            let mut total_len = suc.length;
            let mut total_count = suc.vehicles.len();
            for conn in &suc.successors {
                let lane = &lanes[conn.lane.index()];
                total_len += lane.length;
                total_count += lane.vehicles.len();
            }
            total_count as f64 / total_len
        };
        outgoing /= suc.predecessors.len().max(1) as f64;

        incoming - outgoing
    }
}
