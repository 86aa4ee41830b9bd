//! The `Person` agent and its lifecycle state machine:
//! SLEEP → WAIT_ROUTE → (WALKING | DRIVING) → SLEEP → …

use mts_core::{LaneId, PersonId, PersonRng};
use mts_map::{Lane, LaneKind, MapData};
use mts_route::{MultiModalRoute, PositionSpec, RouteKind, RouteMode, RoutePoll, RoutePosition, Router};
use mts_schedule::{Schedule, ScheduleEntry};

use crate::attr::{PersonSpec, VehicleAttrs};
use crate::controller::VehicleController;
use crate::error::{PersonError, PersonResult};
use crate::manager::{StatsCell, WorldCtx};
use crate::runtime::{Action, Runtime, Status};

/// A simulated person: driver, pedestrian, or sleeper.
pub struct Person {
    pub(crate) id: PersonId,
    pub(crate) vehicle_attrs: VehicleAttrs,
    pub(crate) walk_v: f64,
    pub(crate) bike_v: f64,
    /// Display offset preference along the walking lane's height profile.
    pub(crate) vertical_offset_rate: f64,
    /// Lateral display offset on walking lanes (m).
    pub(crate) horizontal_offset: f64,

    pub(crate) rng: PersonRng,
    pub runtime: Runtime,
    pub(crate) schedule: Schedule,
    /// Pending schedule replacement, applied at the next *prepare*.
    pub(crate) new_schedule: Option<Vec<ScheduleEntry>>,
    pub(crate) route: MultiModalRoute,
    pub(crate) controller: VehicleController,
    /// Pending position reset, honored while sleeping.
    pub(crate) reset_position: Option<PositionSpec>,
}

impl Person {
    pub(crate) fn new(
        id: PersonId,
        spec: PersonSpec,
        map: &MapData,
        seed_offset: u64,
        time: f64,
    ) -> PersonResult<Self> {
        spec.vehicle.validate()?;
        let mut rng = PersonRng::new(id, seed_offset);
        let mut vehicle_attrs = spec.vehicle;
        vehicle_attrs.perturb(&mut rng);
        let (walk_v, bike_v, vertical_offset_rate, horizontal_offset) =
            spec.pedestrian.perturbed(&mut rng);

        let mut runtime = Runtime::default();
        match spec.home {
            PositionSpec::Aoi(aoi) => {
                let aoi_data = map.aoi_or_err(aoi).map_err(|_| PersonError::NoHome(id))?;
                runtime.aoi = Some(aoi);
                runtime.xyz = aoi_data.centroid();
                aoi_data.add_person(id);
            }
            PositionSpec::Lane { lane, s } => {
                let lane_data = map.lane_or_err(lane).map_err(|_| PersonError::NoHome(id))?;
                runtime.lane = Some(lane);
                runtime.s = s;
                runtime.xyz = lane_data.position_at(s);
            }
        }

        let mut schedule = Schedule::new();
        schedule.set(map, spec.schedule, time);
        let controller = VehicleController::new(&vehicle_attrs);

        Ok(Self {
            id,
            vehicle_attrs,
            walk_v,
            bike_v,
            vertical_offset_rate,
            horizontal_offset,
            rng,
            runtime,
            schedule,
            new_schedule: None,
            route: MultiModalRoute::new(),
            controller,
            reset_position: None,
        })
    }

    #[inline]
    pub fn id(&self) -> PersonId {
        self.id
    }

    pub fn vehicle_attrs(&self) -> &VehicleAttrs {
        &self.vehicle_attrs
    }

    pub fn walk_v(&self) -> f64 {
        self.walk_v
    }

    pub fn bike_v(&self) -> f64 {
        self.bike_v
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Replace the schedule; applied at the next *prepare*, forcing the
    /// person back to sleep at its current position.
    pub fn set_schedule(&mut self, entries: Vec<ScheduleEntry>) {
        self.new_schedule = Some(entries);
    }

    /// Request a position reset; honored at the next sleeping update.
    pub fn set_reset_position(&mut self, pos: PositionSpec) {
        self.reset_position = Some(pos);
    }

    /// Display position: pedestrians are offset laterally by their personal
    /// preference so co-located walkers do not overlap.
    pub fn display_xyz(&self, map: &MapData, snapshot: &Runtime) -> mts_core::Point {
        if snapshot.status == Status::Walking {
            if let Some(lane) = snapshot.lane {
                let offset =
                    self.horizontal_offset * (0.5 + 0.5 * self.vertical_offset_rate);
                return map.lane(lane).offset_position_at(snapshot.s, offset);
            }
        }
        snapshot.xyz
    }

    // ── Prepare phase ─────────────────────────────────────────────────────

    /// Node-refresh pass, run sequentially before the lane queues resolve
    /// their buffers: apply a pending schedule replacement and rewrite this
    /// person's node keys from the freshly computed positions.
    pub(crate) fn prepare_node(&mut self, map: &mut MapData, snapshot: &Runtime, time: f64) {
        if let Some(entries) = self.new_schedule.take() {
            self.discard_road_presence(&mut map.lanes, snapshot);
            self.runtime.status = Status::Sleep;
            self.runtime.clear_lane_change();
            self.runtime.v = 0.0;
            self.route.clear();
            self.schedule.set(map, entries, time);
        }
        match self.runtime.status {
            Status::Driving => {
                if let (Some(snap_lane), Some(lane)) = (snapshot.lane, self.runtime.lane) {
                    if snap_lane == lane {
                        map.lanes[lane.index()].vehicles.update_key(
                            self.id,
                            snapshot.s,
                            self.runtime.s,
                        );
                    }
                }
                if snapshot.lc.in_shadow_lane() && self.runtime.lc.in_shadow_lane() {
                    if let (Some(snap_shadow), Some(shadow)) =
                        (snapshot.lc.shadow_lane, self.runtime.lc.shadow_lane)
                    {
                        if snap_shadow == shadow {
                            map.lanes[shadow.index()].vehicles.update_key(
                                self.id,
                                snapshot.lc.shadow_s,
                                self.runtime.lc.shadow_s,
                            );
                        }
                    }
                }
            }
            Status::Walking => {
                if let (Some(snap_lane), Some(lane)) = (snapshot.lane, self.runtime.lane) {
                    if snap_lane == lane {
                        map.lanes[lane.index()].pedestrians.update_key(
                            self.id,
                            snapshot.s,
                            self.runtime.s,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    /// Remove every node this person may hold, directly (sequential prepare
    /// context) so pending buffer entries are cancelled too.
    fn discard_road_presence(&self, lanes: &mut [Lane], snapshot: &Runtime) {
        let mut touched: Vec<LaneId> = Vec::with_capacity(4);
        for lane in [
            snapshot.lane,
            snapshot.lc.shadow_lane,
            self.runtime.lane,
            self.runtime.lc.shadow_lane,
        ]
        .into_iter()
        .flatten()
        {
            if !touched.contains(&lane) {
                touched.push(lane);
            }
        }
        for lane in touched {
            match self.runtime.status {
                Status::Driving => lanes[lane.index()].vehicles.discard(self.id),
                Status::Walking => lanes[lane.index()].pedestrians.discard(self.id),
                _ => {
                    lanes[lane.index()].vehicles.discard(self.id);
                    lanes[lane.index()].pedestrians.discard(self.id);
                }
            }
        }
    }

    /// Snapshot-phase work beyond the snapshot copy itself: a fresh action
    /// buffer for drivers.
    pub(crate) fn prepare(&mut self) {
        if self.runtime.status == Status::Driving {
            self.runtime.action = Action::default();
        }
    }

    // ── Update phase ──────────────────────────────────────────────────────

    pub(crate) fn update(&mut self, ctx: &WorldCtx<'_>, router: &dyn Router, stats: &StatsCell) {
        if self.reset_position.is_some() && self.runtime.status != Status::Sleep {
            tracing::error!("person {} position reset outside sleep, dropped", self.id);
            self.reset_position = None;
        }
        match self.runtime.status {
            Status::Sleep => {
                if let Some(pos) = self.reset_position.take() {
                    if let Some(aoi) = self.runtime.aoi {
                        ctx.map.aoi(aoi).remove_person(self.id);
                    }
                    self.reset_by_position(ctx, pos);
                }
                if ctx.t >= self.schedule.departure_time() {
                    self.request_route(ctx, router);
                    self.runtime.status = Status::WaitRoute;
                }
            }
            Status::WaitRoute => match self.route.poll(ctx.map) {
                RoutePoll::Pending => {}
                RoutePoll::Idle | RoutePoll::Resolved => {
                    if self.route.ok() {
                        self.go_out(ctx);
                    } else {
                        self.schedule.next_trip(ctx.t);
                        self.runtime.status = Status::Sleep;
                    }
                }
            },
            Status::Walking => {
                let is_end = self.update_pedestrian(ctx, stats);
                self.runtime.is_trip_end = is_end;
                if is_end {
                    let end = self.route.current_end_position();
                    self.schedule.next_trip(ctx.t);
                    stats.record_trip_end();
                    match end.aoi {
                        Some(aoi) => self.come_in(ctx, aoi),
                        None => self.runtime.status = Status::Sleep,
                    }
                    // A finished journey must not be reused by the next trip.
                    self.route.clear();
                }
            }
            Status::Driving => {
                let is_end = self.update_vehicle(ctx, stats);
                self.runtime.is_trip_end = is_end;
                if is_end {
                    let end = self.route.current_end_position();
                    self.schedule.next_trip(ctx.t);
                    stats.record_trip_end();
                    match end.aoi {
                        Some(aoi) => self.come_in(ctx, aoi),
                        None => self.runtime.status = Status::Sleep,
                    }
                    self.route.clear();
                }
            }
            Status::Passenger => {}
        }
    }

    // ── Departure ─────────────────────────────────────────────────────────

    /// Issue a routing request for the current trip, projecting the start
    /// position onto a lane the trip's mode can use.
    fn request_route(&mut self, ctx: &WorldCtx<'_>, router: &dyn Router) {
        if self.runtime.lane.is_some() && self.runtime.aoi.is_some() {
            tracing::error!("person {} has both a lane and an aoi", self.id);
        }
        // A multi-leg route still in progress needs no new request.
        if self.route.ok() {
            return;
        }
        let Some(trip) = self.schedule.trip() else {
            tracing::error!("person {} departs without a trip", self.id);
            return;
        };
        let is_driving = trip.mode.is_driving();
        let end = match trip.end {
            PositionSpec::Lane { lane, s } => RoutePosition::at_lane(lane, s),
            PositionSpec::Aoi(aoi) => RoutePosition::at_aoi(aoi),
        };
        let mode = if is_driving { RouteMode::Drive } else { RouteMode::Walk };
        let preroutes = trip.routes.clone();
        let start = self.start_position(ctx, is_driving);
        self.route.clear();
        self.route
            .produce(ctx.map, router, &preroutes, start, end, mode, ctx.t);
    }

    /// The position the journey starts from, projected to a drivable
    /// (or walkable) lane when the person rests on the wrong kind.
    ///
    /// # Panics
    /// Panics when no projection exists — the map cannot serve the trip,
    /// which is a data invariant violation.
    fn start_position(&self, ctx: &WorldCtx<'_>, is_driving: bool) -> RoutePosition {
        let map = ctx.map;
        let Some(lane_id) = self.runtime.lane else {
            let Some(aoi) = self.runtime.aoi else {
                panic!("person {} has neither lane nor aoi", self.id);
            };
            return RoutePosition::at_aoi(aoi);
        };
        let lane = map.lane(lane_id);
        let s = self.runtime.s;
        if is_driving && lane.kind() != LaneKind::Driving {
            let (walk_lane, walk_s) = match lane.parent_road() {
                Some(_) => (lane_id, s),
                None => self.junction_escape(map, lane_id),
            };
            let road = map
                .lane(walk_lane)
                .parent_road()
                .unwrap_or_else(|| panic!("person {}: no road for projection from {walk_lane}", self.id));
            let (lane, s) = map.road(road).project_to_driving_lane(&map.lanes, walk_lane, walk_s);
            RoutePosition::at_lane(lane, s)
        } else if !is_driving && lane.kind() != LaneKind::Walking {
            let (drive_lane, drive_s) = match lane.parent_road() {
                Some(_) => (lane_id, s),
                None => self.junction_escape(map, lane_id),
            };
            let road = map
                .lane(drive_lane)
                .parent_road()
                .unwrap_or_else(|| panic!("person {}: no road for projection from {drive_lane}", self.id));
            let (lane, s) = map
                .road(road)
                .project_to_walking_lane(&map.lanes, drive_lane, drive_s)
                .unwrap_or_else(|| panic!("person {}: road has no walking lane", self.id));
            RoutePosition::at_lane(lane, s)
        } else {
            RoutePosition::at_lane(lane_id, s)
        }
    }

    /// A junction lane projects through its connections onto a road lane:
    /// the smallest-id successor (entering at its start), else the
    /// smallest-id predecessor (entering at its end).
    fn junction_escape(&self, map: &MapData, lane_id: LaneId) -> (LaneId, f64) {
        let lane = map.lane(lane_id);
        for conn in lane.successors() {
            if map.lane(conn.lane).parent_road().is_some() {
                return (conn.lane, 0.0);
            }
        }
        for conn in lane.predecessors() {
            if map.lane(conn.lane).parent_road().is_some() {
                return (conn.lane, map.lane(conn.lane).length());
            }
        }
        panic!("person {}: lane {lane_id} connects to no road lane", self.id);
    }

    /// Leave the current AOI (or sleeping spot) onto the route's start lane.
    fn go_out(&mut self, ctx: &WorldCtx<'_>) {
        let start = self.route.current_start_position();
        let start_lane = start.lane.expect("route start is resolved");
        match self.route.kind {
            RouteKind::Drive => {
                self.runtime.status = Status::Driving;
                self.runtime.lane = Some(start_lane);
                self.runtime.s = start.s;
                self.runtime.clear_lane_change();
                if let Some(aoi) = self.runtime.aoi.take() {
                    ctx.map.aoi(aoi).remove_person(self.id);
                }
                self.runtime.xyz = ctx.map.lane(start_lane).position_at(start.s);
                let snapshot = &ctx.snapshots[self.id.index()];
                let had_node = snapshot
                    .lane
                    .and_then(|l| ctx.map.lane(l).vehicles.position(snapshot.s, self.id))
                    .is_some();
                if had_node {
                    self.update_lane_vehicle_nodes(ctx, true);
                } else {
                    ctx.map.lane(start_lane).vehicles.add(self.runtime.s, self.id);
                }
            }
            RouteKind::Walk => {
                self.runtime.status = Status::Walking;
                self.runtime.lane = Some(start_lane);
                self.runtime.s = start.s;
                if let Some(aoi) = self.runtime.aoi.take() {
                    ctx.map.aoi(aoi).remove_person(self.id);
                }
                self.runtime.xyz = ctx.map.lane(start_lane).position_at(start.s);
                ctx.map
                    .lane(start_lane)
                    .pedestrians
                    .add(self.runtime.s, self.id);
            }
        }
    }

    /// Enter `aoi` at the end of a trip.
    pub(crate) fn come_in(&mut self, ctx: &WorldCtx<'_>, aoi: mts_core::AoiId) {
        self.runtime.aoi = Some(aoi);
        ctx.map.aoi(aoi).add_person(self.id);
        self.runtime.xyz = ctx.map.aoi(aoi).centroid();
        self.runtime.status = Status::Sleep;
        self.runtime.lane = None;
        self.runtime.s = 0.0;
    }

    /// Apply a pending position reset while sleeping.
    fn reset_by_position(&mut self, ctx: &WorldCtx<'_>, pos: PositionSpec) {
        tracing::debug!("person {} reset position to {pos:?}", self.id);
        self.runtime = Runtime::default();
        match pos {
            PositionSpec::Lane { lane, s } => {
                self.runtime.lane = Some(lane);
                self.runtime.s = s;
                self.runtime.xyz = ctx.map.lane(lane).position_at(s);
            }
            PositionSpec::Aoi(aoi) => {
                self.runtime.aoi = Some(aoi);
                self.runtime.xyz = ctx.map.aoi(aoi).centroid();
                ctx.map.aoi(aoi).add_person(self.id);
            }
        }
    }
}
