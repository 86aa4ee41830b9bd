//! `MapBuilder` — incremental map construction with invariant validation,
//! and the resulting [`MapData`] arena.
//!
//! The builder accepts lanes, connections, roads, junctions, and AOIs in any
//! order (connections must exist before `build`).  `build()` sorts every
//! lane's connection lists by lane id (deterministic iteration), caches
//! unique predecessors/successors, derives road↔junction adjacency, and
//! rejects maps that violate the structural invariants:
//!
//! - every lane has exactly one parent,
//! - a road's predecessor and successor junctions are unique,
//! - every junction driving lane has exactly one predecessor and successor,
//! - group pre-lanes lie on the group's in-road,
//! - signal phases cover exactly the junction's lanes,
//! - AOI gates sit on lanes of the matching kind.

use std::collections::HashMap;

use mts_core::geom::{self, Point};
use mts_core::{AoiId, CoreError, JunctionId, LaneId, LightState, RoadId};

use crate::aoi::Aoi;
use crate::error::{MapError, MapResult};
use crate::junction::{Junction, LaneGroup, LightProgram};
use crate::lane::{Connection, Lane, LaneKind, LaneParent, LaneTurn, Overlap};
use crate::queue::LaneQueue;
use crate::road::Road;

// ── Specs ─────────────────────────────────────────────────────────────────────

/// Input description of one lane.
#[derive(Clone, Debug)]
pub struct LaneSpec {
    pub kind: LaneKind,
    pub turn: LaneTurn,
    /// Design speed limit (m/s).
    pub max_speed: f64,
    /// Lane width (m).
    pub width: f64,
    /// Centerline polyline; length is computed from it.
    pub line: Vec<Point>,
}

/// Input description of one road: its lanes left to right.
#[derive(Clone, Debug)]
pub struct RoadSpec {
    pub name: String,
    pub lanes: Vec<LaneId>,
}

/// One (in-road, out-road) group of connecting lanes inside a junction,
/// left to right.
#[derive(Clone, Debug)]
pub struct GroupSpec {
    pub in_road: RoadId,
    pub out_road: RoadId,
    pub lanes: Vec<LaneId>,
}

/// Input description of one junction.
#[derive(Clone, Debug, Default)]
pub struct JunctionSpec {
    /// All lanes inside the junction, in signal-program order.
    pub lanes: Vec<LaneId>,
    pub groups: Vec<GroupSpec>,
    /// Available phases for the Max-Pressure controller.
    pub phases: Vec<Vec<LightState>>,
    pub fixed_program: Option<LightProgram>,
}

/// Input description of one AOI.
#[derive(Clone, Debug, Default)]
pub struct AoiSpec {
    pub boundary: Vec<Point>,
    pub driving_gates: Vec<(LaneId, f64)>,
    pub walking_gates: Vec<(LaneId, f64)>,
}

// ── MapData ───────────────────────────────────────────────────────────────────

/// The validated map: arena vectors indexed by the typed ids.
///
/// Fields are `pub` for direct indexed access on hot paths.  Do not construct
/// directly; use [`MapBuilder`].
pub struct MapData {
    pub lanes: Vec<Lane>,
    pub roads: Vec<Road>,
    pub junctions: Vec<Junction>,
    pub aois: Vec<Aoi>,
}

impl MapData {
    // ── Arena accessors ───────────────────────────────────────────────────
    //
    // The plain accessors index directly: an out-of-range id is a corrupt
    // handle and aborts.  The `*_or_err` twins are for ids arriving from
    // outside callers.

    #[inline]
    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id.index()]
    }

    #[inline]
    pub fn lane_mut(&mut self, id: LaneId) -> &mut Lane {
        &mut self.lanes[id.index()]
    }

    pub fn lane_or_err(&self, id: LaneId) -> MapResult<&Lane> {
        self.lanes
            .get(id.index())
            .ok_or(MapError::Core(CoreError::UnknownLane(id)))
    }

    #[inline]
    pub fn road(&self, id: RoadId) -> &Road {
        &self.roads[id.index()]
    }

    pub fn road_or_err(&self, id: RoadId) -> MapResult<&Road> {
        self.roads
            .get(id.index())
            .ok_or(MapError::Core(CoreError::UnknownRoad(id)))
    }

    #[inline]
    pub fn junction(&self, id: JunctionId) -> &Junction {
        &self.junctions[id.index()]
    }

    pub fn junction_or_err(&self, id: JunctionId) -> MapResult<&Junction> {
        self.junctions
            .get(id.index())
            .ok_or(MapError::Core(CoreError::UnknownJunction(id)))
    }

    #[inline]
    pub fn aoi(&self, id: AoiId) -> &Aoi {
        &self.aois[id.index()]
    }

    pub fn aoi_or_err(&self, id: AoiId) -> MapResult<&Aoi> {
        self.aois
            .get(id.index())
            .ok_or(MapError::Core(CoreError::UnknownAoi(id)))
    }

    // ── Phase drivers ─────────────────────────────────────────────────────

    /// Lane *prepare*: commit speed buffers, resolve queue membership, then
    /// rebuild cross-lane neighbor links against the resorted queues.
    pub fn prepare_lanes(&mut self) {
        crate::lane::prepare_all(&mut self.lanes);
    }

    /// AOI *prepare*: drain occupancy buffers.
    pub fn prepare_aois(&mut self) {
        crate::aoi::prepare_all(&mut self.aois);
    }
}

// ── MapBuilder ────────────────────────────────────────────────────────────────

/// Construct a [`MapData`] incrementally, then call [`build`](Self::build).
pub struct MapBuilder {
    lanes: Vec<Lane>,
    parented: Vec<bool>,
    double_parented: Vec<LaneId>,
    roads: Vec<Road>,
    junction_specs: Vec<JunctionSpec>,
    aois: Vec<Aoi>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self {
            lanes: Vec::new(),
            parented: Vec::new(),
            double_parented: Vec::new(),
            roads: Vec::new(),
            junction_specs: Vec::new(),
            aois: Vec::new(),
        }
    }

    /// Add a lane and return its id (sequential from 0).
    pub fn add_lane(&mut self, spec: LaneSpec) -> LaneId {
        let id = LaneId(self.lanes.len() as u32);
        let line_lengths = geom::polyline_lengths(&spec.line);
        let line_directions = geom::polyline_directions(&spec.line);
        let length = *line_lengths.last().unwrap_or(&0.0);
        self.lanes.push(Lane {
            id,
            kind: spec.kind,
            turn: spec.turn,
            parent: LaneParent::Junction(JunctionId::INVALID),
            predecessors: Vec::new(),
            successors: Vec::new(),
            unique_predecessor: None,
            unique_successor: None,
            side_lanes: [Vec::new(), Vec::new()],
            overlaps: Vec::new(),
            aois: Vec::new(),
            line: spec.line,
            line_lengths,
            line_directions,
            length,
            width: spec.width,
            max_v: spec.max_speed,
            max_v_buffer: spec.max_speed,
            light: Default::default(),
            vehicles: LaneQueue::new(),
            pedestrians: LaneQueue::new(),
        });
        self.parented.push(false);
        id
    }

    /// Declare that the end of `from` connects to the start of `to`.
    pub fn connect(&mut self, from: LaneId, to: LaneId) {
        self.lanes[from.index()].successors.push(Connection { lane: to });
        self.lanes[to.index()].predecessors.push(Connection { lane: from });
    }

    /// Declare a crossing between two lanes.
    pub fn add_overlap(&mut self, a: LaneId, a_s: f64, b: LaneId, b_s: f64, a_first: bool) {
        self.lanes[a.index()].overlaps.push(Overlap {
            self_s: a_s,
            other: b,
            other_s: b_s,
            self_first: a_first,
        });
        self.lanes[b.index()].overlaps.push(Overlap {
            self_s: b_s,
            other: a,
            other_s: a_s,
            self_first: !a_first,
        });
    }

    /// Add a road over the given lanes (left to right) and return its id.
    ///
    /// Sets each lane's parent and offset and derives the side-neighbor
    /// arrays among the road's driving lanes.
    pub fn add_road(&mut self, spec: RoadSpec) -> RoadId {
        let id = RoadId(self.roads.len() as u32);
        let mut driving = Vec::new();
        let mut walking = Vec::new();
        for (offset, &lane_id) in spec.lanes.iter().enumerate() {
            self.set_parent(lane_id, LaneParent::Road { road: id, offset });
            match self.lanes[lane_id.index()].kind {
                LaneKind::Driving => driving.push(lane_id),
                LaneKind::Walking => walking.push(lane_id),
                LaneKind::Rail => {}
            }
        }
        // Side neighbors: other driving lanes of the same road, nearest
        // first.
        for (i, &lane_id) in driving.iter().enumerate() {
            let left: Vec<LaneId> = driving[..i].iter().rev().copied().collect();
            let right: Vec<LaneId> = driving[i + 1..].to_vec();
            self.lanes[lane_id.index()].side_lanes = [left, right];
        }
        let (max_v, avg_len) = if driving.is_empty() {
            (0.0, 0.0)
        } else {
            let n = driving.len() as f64;
            (
                driving.iter().map(|l| self.lanes[l.index()].max_v).sum::<f64>() / n,
                driving.iter().map(|l| self.lanes[l.index()].length).sum::<f64>() / n,
            )
        };
        self.roads.push(Road {
            id,
            name: spec.name,
            lanes: spec.lanes,
            driving_lanes: driving,
            walking_lanes: walking,
            predecessor: None,
            successor: None,
            max_v,
            avg_driving_len: avg_len,
        });
        id
    }

    /// Add a junction over the given lanes and return its id.
    pub fn add_junction(&mut self, spec: JunctionSpec) -> JunctionId {
        let id = JunctionId(self.junction_specs.len() as u32);
        for &lane_id in &spec.lanes {
            self.set_parent(lane_id, LaneParent::Junction(id));
        }
        self.junction_specs.push(spec);
        id
    }

    /// Add an AOI and return its id.
    pub fn add_aoi(&mut self, spec: AoiSpec) -> AoiId {
        let id = AoiId(self.aois.len() as u32);
        for &(lane_id, _) in spec.driving_gates.iter().chain(&spec.walking_gates) {
            self.lanes[lane_id.index()].aois.push(id);
        }
        self.aois
            .push(Aoi::new(id, spec.boundary, spec.driving_gates, spec.walking_gates));
        id
    }

    fn set_parent(&mut self, lane: LaneId, parent: LaneParent) {
        if self.parented[lane.index()] {
            self.double_parented.push(lane);
        }
        self.parented[lane.index()] = true;
        self.lanes[lane.index()].parent = parent;
    }

    /// Validate the topology and produce the arena.
    pub fn build(mut self) -> MapResult<MapData> {
        // Deterministic connection order, cached unique links.
        for lane in &mut self.lanes {
            lane.predecessors.sort_by_key(|c| c.lane);
            lane.successors.sort_by_key(|c| c.lane);
            lane.overlaps.sort_by(|a, b| a.self_s.total_cmp(&b.self_s));
            lane.unique_predecessor =
                (lane.predecessors.len() == 1).then(|| lane.predecessors[0].lane);
            lane.unique_successor =
                (lane.successors.len() == 1).then(|| lane.successors[0].lane);
        }

        for (i, &parented) in self.parented.iter().enumerate() {
            if !parented {
                return Err(MapError::NoParent(LaneId(i as u32)));
            }
        }
        if let Some(&lane) = self.double_parented.first() {
            return Err(MapError::BothParents(lane));
        }

        // AOI gates must sit on lanes of the matching kind.
        for aoi in &self.aois {
            for &(lane_id, _) in &aoi.driving_gates {
                if self.lanes[lane_id.index()].kind != LaneKind::Driving {
                    return Err(MapError::BadGateLane { lane: lane_id, gate: "driving" });
                }
            }
            for &(lane_id, _) in &aoi.walking_gates {
                if self.lanes[lane_id.index()].kind != LaneKind::Walking {
                    return Err(MapError::BadGateLane { lane: lane_id, gate: "walking" });
                }
            }
        }

        // Junction driving lanes: exactly one predecessor and successor.
        let junctions = self.build_junctions()?;

        // Road ↔ junction adjacency, unique per road.
        for road in &mut self.roads {
            if road.lanes.is_empty() {
                return Err(MapError::EmptyRoad { road: road.id });
            }
            for &lane_id in &road.driving_lanes.clone() {
                let lane = &self.lanes[lane_id.index()];
                for conn in lane.predecessors.clone() {
                    let other = &self.lanes[conn.lane.index()];
                    let Some(junc) = other.parent_junction() else {
                        return Err(MapError::NonJunctionNeighbor {
                            road: road.id,
                            lane: lane_id,
                            side: "predecessor",
                            other: conn.lane,
                        });
                    };
                    match road.predecessor {
                        None => road.predecessor = Some(junc),
                        Some(existing) if existing != junc => {
                            return Err(MapError::AmbiguousRoadJunction {
                                road: road.id,
                                side: "predecessor",
                                a: existing,
                                b: junc,
                            });
                        }
                        Some(_) => {}
                    }
                }
                for conn in lane.successors.clone() {
                    let other = &self.lanes[conn.lane.index()];
                    let Some(junc) = other.parent_junction() else {
                        return Err(MapError::NonJunctionNeighbor {
                            road: road.id,
                            lane: lane_id,
                            side: "successor",
                            other: conn.lane,
                        });
                    };
                    match road.successor {
                        None => road.successor = Some(junc),
                        Some(existing) if existing != junc => {
                            return Err(MapError::AmbiguousRoadJunction {
                                road: road.id,
                                side: "successor",
                                a: existing,
                                b: junc,
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        Ok(MapData {
            lanes: self.lanes,
            roads: self.roads,
            junctions,
            aois: self.aois,
        })
    }

    fn build_junctions(&mut self) -> MapResult<Vec<Junction>> {
        let mut junctions = Vec::with_capacity(self.junction_specs.len());
        for (i, spec) in std::mem::take(&mut self.junction_specs).into_iter().enumerate() {
            let id = JunctionId(i as u32);
            let mut driving_lanes = Vec::new();
            for &lane_id in &spec.lanes {
                let lane = &self.lanes[lane_id.index()];
                if lane.kind != LaneKind::Driving {
                    continue;
                }
                if lane.predecessors.len() != 1 || lane.successors.len() != 1 {
                    return Err(MapError::AmbiguousJunctionLane {
                        lane: lane_id,
                        preds: lane.predecessors.len(),
                        succs: lane.successors.len(),
                    });
                }
                driving_lanes.push(lane_id);
            }

            let mut groups = Vec::with_capacity(spec.groups.len());
            let mut group_index = HashMap::new();
            for g in spec.groups {
                let mut pre_lanes = Vec::with_capacity(g.lanes.len());
                for &lane_id in &g.lanes {
                    let pre = self.lanes[lane_id.index()]
                        .unique_predecessor
                        .ok_or(MapError::AmbiguousJunctionLane {
                            lane: lane_id,
                            preds: self.lanes[lane_id.index()].predecessors.len(),
                            succs: self.lanes[lane_id.index()].successors.len(),
                        })?;
                    if self.lanes[pre.index()].parent_road() != Some(g.in_road) {
                        return Err(MapError::PreLaneOffRoad {
                            junction: id,
                            lane: lane_id,
                            pre,
                            in_road: g.in_road,
                        });
                    }
                    pre_lanes.push(pre);
                }
                group_index.insert((g.in_road, g.out_road), groups.len());
                groups.push(LaneGroup {
                    in_road: g.in_road,
                    out_road: g.out_road,
                    lanes: g.lanes,
                    pre_lanes,
                });
            }

            for (phase_idx, phase) in spec.phases.iter().enumerate() {
                if phase.len() != spec.lanes.len() {
                    return Err(MapError::PhaseLaneCountMismatch {
                        junction: id,
                        phase: phase_idx,
                        got: phase.len(),
                        expected: spec.lanes.len(),
                    });
                }
            }
            if let Some(program) = &spec.fixed_program {
                for (phase_idx, phase) in program.phases.iter().enumerate() {
                    if phase.states.len() != spec.lanes.len() {
                        return Err(MapError::PhaseLaneCountMismatch {
                            junction: id,
                            phase: phase_idx,
                            got: phase.states.len(),
                            expected: spec.lanes.len(),
                        });
                    }
                }
            }

            junctions.push(Junction {
                id,
                lanes: spec.lanes,
                driving_lanes,
                groups,
                group_index,
                phases: spec.phases,
                fixed_program: spec.fixed_program,
            });
        }
        Ok(junctions)
    }
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
