//! The `Router` trait and the in-process `LocalRouter`.
//!
//! # Calling forms
//!
//! Routing is consumed in two forms:
//!
//! - **sync**: [`Router::route`] computes and returns the journeys;
//! - **async**: [`Router::route_async`] takes a [`RouteReply`] completion
//!   slot and may fulfill it from any thread at any later time.  The default
//!   implementation fulfills synchronously, which is what [`LocalRouter`]
//!   uses; a networked router can spawn and reply later.
//!
//! The requesting person holds the matching [`RouteHandle`] and polls it each
//! step while in the wait-route state.  Handles abandoned at shutdown are
//! simply dropped — nothing blocks on them.

use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use mts_core::{AoiId, LaneId, RoadId};
use mts_map::{LaneKind, MapData};

use crate::error::{RouteError, RouteResult};
use crate::types::{
    Journey, MovingDirection, PositionSpec, RouteMode, RouteRequest, RouteResponse, WalkSegment,
};

// ── Completion slot ───────────────────────────────────────────────────────────

type Slot = Arc<Mutex<Option<RouteResult<RouteResponse>>>>;

/// Producer half of a routing completion: the router writes the result here.
pub struct RouteReply(Slot);

impl RouteReply {
    /// Deliver the routing result.  Overwrites an earlier unread result.
    pub fn fulfill(self, result: RouteResult<RouteResponse>) {
        *self.0.lock().expect("route slot poisoned") = Some(result);
    }
}

/// Consumer half of a routing completion: the requesting person polls this.
pub struct RouteHandle(Slot);

impl RouteHandle {
    /// Take the result if it has arrived.
    pub fn try_take(&self) -> Option<RouteResult<RouteResponse>> {
        self.0.lock().expect("route slot poisoned").take()
    }
}

/// Create a connected reply/handle pair.
pub fn route_channel() -> (RouteReply, RouteHandle) {
    let slot: Slot = Arc::new(Mutex::new(None));
    (RouteReply(slot.clone()), RouteHandle(slot))
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing engine.
///
/// Implementations must be `Send + Sync`: requests are issued from the
/// parallel person update.
pub trait Router: Send + Sync {
    /// Compute the journeys for `req`, synchronously.
    fn route(&self, req: &RouteRequest) -> RouteResult<RouteResponse>;

    /// Compute the journeys for `req` and deliver them through `reply`,
    /// possibly from another thread.  Default: synchronous fulfillment.
    fn route_async(&self, req: RouteRequest, reply: RouteReply) {
        reply.fulfill(self.route(&req));
    }
}

// ── LocalRouter ───────────────────────────────────────────────────────────────

/// Walking speed assumed for walking-journey ETAs (m/s).
const WALK_ETA_SPEED: f64 = 1.34;

/// A zero-cost hop between two walking-lane endpoints that meet.
#[derive(Copy, Clone)]
struct WalkHop {
    node: u32,
}

/// In-process Dijkstra router over the map.
///
/// Driving routes run over the road graph (edges = junction driving-lane
/// groups, free-flow travel time in integer milliseconds as the cost).
/// Walking routes run over the walking-lane adjacency, where each lane
/// contributes two endpoint nodes and walking a lane costs its length in
/// millimetres.  Integer costs with id tie-breaks keep results deterministic.
pub struct LocalRouter {
    /// `road → (next road, cost ms)`.
    road_edges: Vec<Vec<(RoadId, u32)>>,
    /// Free-flow traversal cost of each road (ms).
    road_cost: Vec<u32>,
    /// Walking endpoint adjacency: node `2 * lane + end` (`end` 0 = start,
    /// 1 = end of the lane); zero-cost hops between touching endpoints.
    walk_hops: Vec<Vec<WalkHop>>,
    /// Walking lane lengths (mm), indexed by lane.
    walk_len: Vec<u64>,
    /// The preferred driving gate lane of each AOI (smallest lane id).
    driving_gate: Vec<Option<(LaneId, f64)>>,
    walking_gate: Vec<Option<(LaneId, f64)>>,
}

impl LocalRouter {
    pub fn new(map: &MapData) -> Self {
        let road_cost: Vec<u32> = map
            .roads
            .iter()
            .map(|r| {
                if r.max_v() > 0.0 {
                    (r.avg_driving_len() / r.max_v() * 1000.0) as u32
                } else {
                    u32::MAX / 4
                }
            })
            .collect();

        let mut road_edges: Vec<Vec<(RoadId, u32)>> = vec![Vec::new(); map.roads.len()];
        for junction in &map.junctions {
            for group in junction.groups() {
                road_edges[group.in_road.index()]
                    .push((group.out_road, road_cost[group.out_road.index()]));
            }
        }
        for edges in &mut road_edges {
            edges.sort_by_key(|&(road, _)| road);
            edges.dedup_by_key(|&mut (road, _)| road);
        }

        let mut walk_hops: Vec<Vec<WalkHop>> = vec![Vec::new(); map.lanes.len() * 2];
        let mut walk_len = vec![0u64; map.lanes.len()];
        for lane in &map.lanes {
            if lane.kind() != LaneKind::Walking {
                continue;
            }
            walk_len[lane.id().index()] = (lane.length() * 1000.0) as u64;
            // The end of this lane meets the start of each walking successor;
            // pedestrians may cross the joint in either direction.
            for conn in lane.successors() {
                if map.lane(conn.lane).kind() != LaneKind::Walking {
                    continue;
                }
                let a = lane.id().index() as u32 * 2 + 1;
                let b = conn.lane.index() as u32 * 2;
                walk_hops[a as usize].push(WalkHop { node: b });
                walk_hops[b as usize].push(WalkHop { node: a });
            }
        }

        let pick_gate = |gates: &[(LaneId, f64)]| {
            gates
                .iter()
                .min_by_key(|&&(lane, _)| lane)
                .copied()
        };
        let driving_gate = map.aois.iter().map(|a| pick_gate(a.driving_gates())).collect();
        let walking_gate = map.aois.iter().map(|a| pick_gate(a.walking_gates())).collect();

        Self {
            road_edges,
            road_cost,
            walk_hops,
            walk_len,
            driving_gate,
            walking_gate,
        }
    }

    // ── Position resolution ───────────────────────────────────────────────

    fn driving_anchor(&self, map: &MapData, spec: PositionSpec) -> RouteResult<RoadId> {
        match spec {
            PositionSpec::Lane { lane, .. } => {
                let mut lane = map.lane(lane);
                // A junction lane resolves through its unique successor.
                while lane.in_junction() {
                    match lane.unique_successor() {
                        Some(next) => lane = map.lane(next),
                        None => return Err(RouteError::NoRoute),
                    }
                }
                lane.parent_road().ok_or(RouteError::NoRoute)
            }
            PositionSpec::Aoi(aoi) => {
                let (lane, _) =
                    self.driving_gate[aoi.index()].ok_or(RouteError::NoRoute)?;
                map.lane(lane).parent_road().ok_or(RouteError::NoRoute)
            }
        }
    }

    fn walking_anchor(&self, map: &MapData, spec: PositionSpec) -> RouteResult<(LaneId, f64)> {
        match spec {
            PositionSpec::Lane { lane, s } => Ok((lane, s)),
            PositionSpec::Aoi(aoi) => {
                self.walking_gate[aoi.index()].ok_or(RouteError::NoRoute)
            }
        }
    }

    // ── Driving search ────────────────────────────────────────────────────

    fn search_driving(&self, from: RoadId, to: RoadId) -> RouteResult<(Vec<RoadId>, f64)> {
        if from == to {
            return Ok((vec![from], self.road_cost[from.index()] as f64 / 1000.0));
        }
        let n = self.road_edges.len();
        let mut dist = vec![u32::MAX; n];
        let mut prev = vec![RoadId::INVALID; n];
        let mut heap: BinaryHeap<std::cmp::Reverse<(u32, RoadId)>> = BinaryHeap::new();
        dist[from.index()] = self.road_cost[from.index()];
        heap.push(std::cmp::Reverse((dist[from.index()], from)));

        while let Some(std::cmp::Reverse((cost, road))) = heap.pop() {
            if road == to {
                let mut roads = vec![to];
                let mut cur = to;
                while prev[cur.index()] != RoadId::INVALID {
                    cur = prev[cur.index()];
                    roads.push(cur);
                }
                roads.reverse();
                return Ok((roads, cost as f64 / 1000.0));
            }
            if cost > dist[road.index()] {
                continue; // stale heap entry
            }
            for &(next, edge_cost) in &self.road_edges[road.index()] {
                let new_cost = cost.saturating_add(edge_cost);
                if new_cost < dist[next.index()] {
                    dist[next.index()] = new_cost;
                    prev[next.index()] = road;
                    heap.push(std::cmp::Reverse((new_cost, next)));
                }
            }
        }
        Err(RouteError::NoRoute)
    }

    // ── Walking search ────────────────────────────────────────────────────

    fn search_walking(
        &self,
        map: &MapData,
        from: (LaneId, f64),
        to: (LaneId, f64),
    ) -> RouteResult<(Vec<WalkSegment>, f64)> {
        let (from_lane, from_s) = from;
        let (to_lane, to_s) = to;
        if map.lane(from_lane).kind() != LaneKind::Walking
            || map.lane(to_lane).kind() != LaneKind::Walking
        {
            return Err(RouteError::NoRoute);
        }
        if from_lane == to_lane {
            let direction = if to_s >= from_s {
                MovingDirection::Forward
            } else {
                MovingDirection::Backward
            };
            let dist = (to_s - from_s).abs();
            return Ok((
                vec![WalkSegment { lane: from_lane, direction }],
                dist / WALK_ETA_SPEED,
            ));
        }

        let n = self.walk_hops.len();
        let mut dist = vec![u64::MAX; n];
        let mut prev = vec![u32::MAX; n];
        let mut heap: BinaryHeap<std::cmp::Reverse<(u64, u32)>> = BinaryHeap::new();
        // Seed: walk from `from_s` to either end of the start lane.
        let start_base = from_lane.index() as u32 * 2;
        let seed = [
            (start_base, (from_s * 1000.0) as u64),
            (start_base + 1, ((map.lane(from_lane).length() - from_s).max(0.0) * 1000.0) as u64),
        ];
        for (node, cost) in seed {
            dist[node as usize] = cost;
            heap.push(std::cmp::Reverse((cost, node)));
        }

        let goal_base = to_lane.index() as u32 * 2;
        while let Some(std::cmp::Reverse((cost, node))) = heap.pop() {
            if cost > dist[node as usize] {
                continue;
            }
            if node == goal_base || node == goal_base + 1 {
                let tail = if node == goal_base {
                    (to_s * 1000.0) as u64
                } else {
                    ((map.lane(to_lane).length() - to_s).max(0.0) * 1000.0) as u64
                };
                let segments = self.reconstruct_walk(&prev, node, from_lane, to_lane);
                return Ok((segments, (cost + tail) as f64 / 1000.0 / WALK_ETA_SPEED));
            }
            // Walk the lane to its other endpoint.
            let lane = node / 2;
            let other = lane * 2 + (1 - node % 2);
            let new_cost = cost.saturating_add(self.walk_len[lane as usize]);
            if new_cost < dist[other as usize] {
                dist[other as usize] = new_cost;
                prev[other as usize] = node;
                heap.push(std::cmp::Reverse((new_cost, other)));
            }
            // Hop to touching endpoints of other lanes.
            for hop in &self.walk_hops[node as usize] {
                if cost < dist[hop.node as usize] {
                    dist[hop.node as usize] = cost;
                    prev[hop.node as usize] = node;
                    heap.push(std::cmp::Reverse((cost, hop.node)));
                }
            }
        }
        Err(RouteError::NoRoute)
    }

    /// Turn the predecessor chain into `(lane, direction)` segments.
    fn reconstruct_walk(
        &self,
        prev: &[u32],
        goal: u32,
        from_lane: LaneId,
        to_lane: LaneId,
    ) -> Vec<WalkSegment> {
        let mut nodes = vec![goal];
        let mut cur = goal;
        while prev[cur as usize] != u32::MAX {
            cur = prev[cur as usize];
            nodes.push(cur);
        }
        nodes.reverse();

        let mut segments = Vec::new();
        // First segment: the seed walked from `from_s` toward the seeded
        // endpoint; leaving via the end means forward.
        segments.push(WalkSegment {
            lane: from_lane,
            direction: if nodes[0] % 2 == 1 {
                MovingDirection::Forward
            } else {
                MovingDirection::Backward
            },
        });
        // Intermediate lane traversals: consecutive nodes on the same lane.
        for pair in nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a / 2 == b / 2 && a != b {
                segments.push(WalkSegment {
                    lane: LaneId(a / 2),
                    direction: if b % 2 == 1 {
                        MovingDirection::Forward
                    } else {
                        MovingDirection::Backward
                    },
                });
            }
        }
        // Final segment: entering via the start means forward.
        segments.push(WalkSegment {
            lane: to_lane,
            direction: if goal % 2 == 0 {
                MovingDirection::Forward
            } else {
                MovingDirection::Backward
            },
        });
        segments
    }
}

/// The router needs the map at query time; bundle them for the trait.
pub struct LocalRouterWithMap<'a> {
    pub router: &'a LocalRouter,
    pub map: &'a MapData,
}

impl Router for LocalRouterWithMap<'_> {
    fn route(&self, req: &RouteRequest) -> RouteResult<RouteResponse> {
        self.router.route_on(self.map, req)
    }
}

impl LocalRouter {
    /// Answer `req` against `map`.
    pub fn route_on(&self, map: &MapData, req: &RouteRequest) -> RouteResult<RouteResponse> {
        match req.mode {
            RouteMode::Drive | RouteMode::Taxi => {
                let from = self.driving_anchor(map, req.start)?;
                let to = self.driving_anchor(map, req.end)?;
                let (roads, eta) = self.search_driving(from, to)?;
                Ok(RouteResponse { journeys: vec![Journey::Driving { roads, eta }] })
            }
            RouteMode::Walk => {
                let from = self.walking_anchor(map, req.start)?;
                let to = self.walking_anchor(map, req.end)?;
                let (segments, eta) = self.search_walking(map, from, to)?;
                Ok(RouteResponse { journeys: vec![Journey::Walking { segments, eta }] })
            }
            RouteMode::Bus | RouteMode::Subway => {
                tracing::warn!("transit routing not available in the local router");
                Err(RouteError::NoRoute)
            }
        }
    }

    /// First driving gate (smallest lane id) of `aoi`, if any.
    pub fn aoi_driving_gate(&self, aoi: AoiId) -> Option<(LaneId, f64)> {
        self.driving_gate[aoi.index()]
    }
}
