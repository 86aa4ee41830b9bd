//! The vehicle route state machine: consuming a driving journey, choosing
//! junction lanes, and advising the lane-change planner.

use mts_core::{JunctionId, LaneId, RoadId, Side};
use mts_map::MapData;

use crate::error::{RouteError, RouteResult};
use crate::types::RoutePosition;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Observation distance is the distance covered in this many seconds.
const VIEW_DISTANCE_FACTOR: f64 = 12.0;
/// Minimum observation distance (m).
const MIN_VIEW_DISTANCE: f64 = 50.0;
/// Forced lane changes reserve at least this distance (m).
const MIN_LC_DISTANCE: f64 = 10.0;
/// ... and at most this distance (m).
const MAX_LC_DISTANCE: f64 = 30.0;
/// Forced-lane-change time horizon (s).
const LC_FACTOR: f64 = 3.0;

// ── JunctionCandidate ─────────────────────────────────────────────────────────

/// One junction along the route: the lanes crossing it between the planned
/// road pair, and their pre-lanes on the incoming road (left to right).
#[derive(Clone, Debug)]
pub struct JunctionCandidate {
    pub junction: JunctionId,
    pub lanes: Vec<LaneId>,
    pub pre_lanes: Vec<LaneId>,
    pub has_traffic_light: bool,
}

// ── LcScan ────────────────────────────────────────────────────────────────────

/// Lateral advice from the route: whether the current lane can enter the
/// next junction, and if not, which way and how far to move.
#[derive(Copy, Clone, Debug)]
pub struct LcScan {
    /// The current lane is within the next pre-lane set.
    pub in_candidate: bool,
    /// While in candidate: how many lanes to the left/right still are.
    pub neighbors: [i64; 2],
    /// While not: which side to move toward ...
    pub side: Side,
    /// ... how many lane changes are needed ...
    pub count: usize,
    /// ... and the forced-change reserve minus the lookahead already
    /// accumulated before the change becomes due (m).
    pub delta_lc_distance: f64,
}

impl Default for LcScan {
    fn default() -> Self {
        Self {
            in_candidate: true,
            neighbors: [0, 0],
            side: Side::Left,
            count: 0,
            delta_lc_distance: 0.0,
        }
    }
}

// ── VehicleRoute ──────────────────────────────────────────────────────────────

/// A driving journey resolved against the map.
///
/// The path is `start → roads[0] → junc_groups[0] → roads[1] → … → end`;
/// both lists are consumed from the front as the vehicle crosses lane
/// boundaries, and `at_road` flips on every transition.
#[derive(Clone, Debug)]
pub struct VehicleRoute {
    pub start: RoutePosition,
    pub end: RoutePosition,
    pub at_road: bool,
    pub roads: Vec<RoadId>,
    pub junc_groups: Vec<JunctionCandidate>,
    /// Router's estimated travel time (s).
    pub eta: f64,
    /// Free-flow travel time over the planned roads (s).
    pub eta_free_flow: f64,
    /// Estimated driving distance (m).
    pub estimated_distance: f64,
}

impl VehicleRoute {
    /// Resolve a driving journey into a route.
    ///
    /// AOI endpoints are completed from their driving gates on the first/last
    /// road; a journey whose last road does not carry the end lane is
    /// rejected (the schedule and the map disagree).
    pub fn from_journey(
        map: &MapData,
        roads: Vec<RoadId>,
        eta: f64,
        mut start: RoutePosition,
        mut end: RoutePosition,
    ) -> RouteResult<Self> {
        if roads.is_empty() {
            return Err(RouteError::EmptyJourney);
        }
        if start.lane.is_none() {
            let aoi = start.aoi.ok_or(RouteError::EmptyPosition)?;
            let (lane, s) = gate_on_road(map, aoi, roads[0])?;
            start.lane = Some(lane);
            start.s = s;
        }
        if end.lane.is_none() {
            let aoi = end.aoi.ok_or(RouteError::EmptyPosition)?;
            let (lane, s) = gate_on_road(map, aoi, *roads.last().expect("non-empty"))?;
            end.lane = Some(lane);
            end.s = s;
        }
        let end_lane = end.lane.expect("resolved above");
        let last_road = *roads.last().expect("non-empty");
        if map.lane(end_lane).parent_road() != Some(last_road) {
            return Err(RouteError::EndMismatch { road: last_road, lane: end_lane });
        }

        let mut junc_groups = Vec::with_capacity(roads.len().saturating_sub(1));
        for pair in roads.windows(2) {
            let (in_road, out_road) = (pair[0], pair[1]);
            let junction = map
                .road(in_road)
                .successor()
                .ok_or(RouteError::RoadsNotConnected { a: in_road, b: out_road })?;
            let group = map
                .junction(junction)
                .driving_lane_group(in_road, out_road)
                .ok_or(RouteError::RoadsNotConnected { a: in_road, b: out_road })?;
            junc_groups.push(JunctionCandidate {
                junction,
                lanes: group.lanes.clone(),
                pre_lanes: group.pre_lanes.clone(),
                has_traffic_light: true,
            });
        }

        // Free-flow estimate: start road from `start.s`, middle roads whole,
        // last road up to `end.s`.
        let mut eta_free_flow = 0.0;
        let mut estimated_distance = 0.0;
        let first = map.road(roads[0]);
        let d = (first.avg_driving_len() - start.s).max(0.0);
        estimated_distance += d;
        eta_free_flow += d / first.max_v();
        for &road_id in roads.iter().skip(1).take(junc_groups.len().saturating_sub(1)) {
            let road = map.road(road_id);
            estimated_distance += road.avg_driving_len();
            eta_free_flow += road.avg_driving_len() / road.max_v();
        }
        if roads.len() > 1 {
            let last = map.road(last_road);
            estimated_distance += end.s;
            eta_free_flow += end.s / last.max_v();
        }

        Ok(Self {
            start,
            end,
            at_road: true,
            roads,
            junc_groups,
            eta,
            eta_free_flow,
            estimated_distance,
        })
    }

    // ── Junction lane choice ──────────────────────────────────────────────

    /// The junction lane of group `junc_index` best matching `pre_lane`:
    /// minimum pre-lane offset delta, ties broken by the same rule applied
    /// to the following junction.
    ///
    /// Returns `(None, 0)` past the end of the route.
    pub fn junction_lane_by_pre_lane(
        &self,
        map: &MapData,
        pre_lane: LaneId,
        junc_index: usize,
    ) -> (Option<LaneId>, i64) {
        let Some(group) = self.junc_groups.get(junc_index) else {
            return (None, 0);
        };
        let pre_offset = map.lane(pre_lane).offset_in_road() as i64;
        let mut min_delta = i64::MAX;
        let mut nearest: Vec<LaneId> = Vec::new();
        for (lane, pre) in group.lanes.iter().zip(&group.pre_lanes) {
            let delta = (map.lane(*pre).offset_in_road() as i64 - pre_offset).abs();
            if delta < min_delta {
                min_delta = delta;
                nearest.clear();
                nearest.push(*lane);
            } else if delta == min_delta {
                nearest.push(*lane);
            }
        }
        if nearest.is_empty() {
            tracing::error!("no junction lane matches pre-lane {pre_lane} at group {junc_index}");
            return (None, 0);
        }
        if nearest.len() == 1 {
            return (Some(nearest[0]), min_delta);
        }
        // Tie: recurse into the next junction through each candidate.
        let mut best = nearest[0];
        let mut min_next = i64::MAX;
        for junc_lane in nearest {
            let Some(next_pre) = map.lane(junc_lane).unique_successor() else {
                continue;
            };
            let (_, next_delta) = self.junction_lane_by_pre_lane(map, next_pre, junc_index + 1);
            if next_delta < min_next {
                min_next = next_delta;
                best = junc_lane;
            }
        }
        (Some(best), min_delta)
    }

    // ── Route consumption ─────────────────────────────────────────────────

    /// The lane after `cur_lane` is fully traversed, consuming the route.
    ///
    /// On a road whose current lane cannot enter the junction (the change
    /// never completed), the vehicle is moved onto the nearest group lane.
    /// Returns `None` when the route is exhausted.
    pub fn next(&mut self, map: &MapData, cur_lane: LaneId, cur_s: f64) -> Option<LaneId> {
        let next_lane;
        if self.at_road {
            if self.junc_groups.is_empty() {
                return None;
            }
            let lc = self.lc_scan(map, cur_lane, cur_s);
            let group = &self.junc_groups[0];
            if !lc.in_candidate {
                next_lane = if lc.side == Side::Left {
                    *group.lanes.last().expect("groups are non-empty")
                } else {
                    *group.lanes.first().expect("groups are non-empty")
                };
            } else {
                let (lane, _) = self.junction_lane_by_pre_lane(map, cur_lane, 0);
                next_lane = lane?;
            }
            self.roads.remove(0);
        } else {
            match map.lane(cur_lane).unique_successor() {
                Some(lane) => next_lane = lane,
                None => {
                    tracing::error!("junction lane {cur_lane} has no unique successor");
                    return None;
                }
            }
            self.junc_groups.remove(0);
        }
        self.at_road = !self.at_road;
        Some(next_lane)
    }

    // ── Lateral advice ────────────────────────────────────────────────────

    /// Scan downstream for the next junction group the current lane cannot
    /// enter.
    ///
    /// The scan range uses the lane's design speed rather than the vehicle's
    /// current speed, so slow vehicles still look far enough ahead.  On the
    /// last road the target is the trip-end lane itself.
    pub fn lc_scan(&self, map: &MapData, cur_lane: LaneId, s: f64) -> LcScan {
        debug_assert!(self.at_road, "lane-change scan away from a road");
        let lane = map.lane(cur_lane);
        let cur_offset = lane.offset_in_road() as i64;

        if self.junc_groups.is_empty() {
            // Last road: line up with the end lane.
            let end_lane = self.end.lane.expect("resolved at ingest");
            let delta = map.lane(end_lane).offset_in_road() as i64 - cur_offset;
            return match delta {
                0 => LcScan::default(),
                d if d < 0 => LcScan {
                    in_candidate: false,
                    side: Side::Left,
                    count: (-d) as usize,
                    ..Default::default()
                },
                d => LcScan {
                    in_candidate: false,
                    side: Side::Right,
                    count: d as usize,
                    ..Default::default()
                },
            };
        }

        let view_distance = (lane.max_v() * VIEW_DISTANCE_FACTOR).max(MIN_VIEW_DISTANCE);
        let mut scan_distance = lane.length() - s;
        let mut lc_length = 0.0;
        let mut scan_lane = cur_lane;
        let mut junc_index = 0;
        while scan_distance < view_distance && junc_index < self.junc_groups.len() {
            let group = &self.junc_groups[junc_index];
            if group.has_traffic_light {
                let scan_offset = map.lane(scan_lane).offset_in_road() as i64;
                let left_offset =
                    map.lane(*group.pre_lanes.first().expect("non-empty")).offset_in_road() as i64;
                let right_offset =
                    map.lane(*group.pre_lanes.last().expect("non-empty")).offset_in_road() as i64;
                if scan_offset < left_offset || scan_offset > right_offset {
                    // The scan lane misses this group: line the current lane
                    // up with the nearest pre-lane, leftmost on ties.
                    let mut min_delta = i64::MAX;
                    for pre in &group.pre_lanes {
                        let delta = map.lane(*pre).offset_in_road() as i64 - cur_offset;
                        if delta.abs() < min_delta.abs() {
                            min_delta = delta;
                        }
                    }
                    if min_delta != 0 {
                        let force =
                            (lane.max_v() * LC_FACTOR).clamp(MIN_LC_DISTANCE, MAX_LC_DISTANCE);
                        return LcScan {
                            in_candidate: false,
                            side: if min_delta < 0 { Side::Left } else { Side::Right },
                            count: min_delta.unsigned_abs() as usize,
                            delta_lc_distance: force - lc_length,
                            ..Default::default()
                        };
                    }
                }
            }
            let (junc_lane, _) = self.junction_lane_by_pre_lane(map, scan_lane, junc_index);
            let Some(junc_lane) = junc_lane else { break };
            let Some(next_scan) = map.lane(junc_lane).unique_successor() else { break };
            let hop = map.lane(junc_lane).length() + map.lane(next_scan).length();
            scan_distance += hop;
            lc_length += hop;
            scan_lane = next_scan;
            junc_index += 1;
        }

        // No blocking group within view: report the margins inside the next
        // pre-lane set.
        let pre = &self.junc_groups[0].pre_lanes;
        let left_offset = map.lane(*pre.first().expect("non-empty")).offset_in_road() as i64;
        let right_offset = map.lane(*pre.last().expect("non-empty")).offset_in_road() as i64;
        LcScan {
            in_candidate: true,
            neighbors: [cur_offset - left_offset, right_offset - cur_offset],
            ..Default::default()
        }
    }
}

/// The gate of `aoi` on a lane of `road`, preferring the smallest lane id.
fn gate_on_road(
    map: &MapData,
    aoi: mts_core::AoiId,
    road: RoadId,
) -> RouteResult<(LaneId, f64)> {
    map.aoi(aoi)
        .driving_gates()
        .iter()
        .filter(|&&(lane, _)| map.lane(lane).parent_road() == Some(road))
        .min_by_key(|&&(lane, _)| lane)
        .copied()
        .ok_or(RouteError::NoGateOnRoad { aoi, road })
}
