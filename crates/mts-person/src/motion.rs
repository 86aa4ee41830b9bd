//! Vehicle motion: Euler integration, Ackermann lane-change execution, and
//! the lane-list node bookkeeping that keeps the dual-presence invariant.

use mts_map::LaneKind;

use crate::manager::{StatsCell, WorldCtx};
use crate::person::Person;
use crate::runtime::{LcState, Runtime, Status};

/// Arriving within this distance of the trip end counts as arrival (m).
const CLOSE_TO_END: f64 = 5.0;

/// One Euler step: new speed and distance covered, stopping exactly at
/// standstill when the deceleration would cross zero.
pub(crate) fn compute_v_and_distance(v: f64, a: f64, dt: f64) -> (f64, f64) {
    let dv = a * dt;
    if v + dv < 0.0 {
        (0.0, v * v / (2.0 * -a))
    } else {
        (v + dv, (v + dv / 2.0) * dt)
    }
}

impl Person {
    // ── The per-step vehicle update ───────────────────────────────────────

    /// Decide, integrate, and maintain lane nodes.  Returns `true` when the
    /// trip ends this step.
    pub(crate) fn update_vehicle(&mut self, ctx: &WorldCtx<'_>, stats: &StatsCell) -> bool {
        let snap = ctx.snapshots[self.id.index()];
        if snap.lc.in_shadow_lane() {
            let present = snap
                .lc
                .shadow_lane
                .and_then(|l| ctx.map.lane(l).vehicles.position(snap.lc.shadow_s, self.id))
                .is_some();
            if !present {
                tracing::error!("vehicle {} shadow node is missing", self.id);
            }
        }
        if self.route.vehicle.is_none() {
            tracing::error!("vehicle {} drives without a route", self.id);
            return true;
        }

        self.runtime.action = self.controller.decide(
            ctx,
            self.route.vehicle.as_ref().expect("checked above"),
            &snap,
            &mut self.rng,
            self.id,
        );

        // On the simulation's final step everything snaps to its end.
        let force_end = ctx.last_step;
        if force_end {
            self.runtime.clear_lane_change();
            self.runtime.action.lc_target = None;
        }

        let skip_to_end = self.refresh_runtime(ctx, stats);
        let reached = self.check_close_to_end(ctx, skip_to_end);
        if reached || force_end {
            self.update_lane_vehicle_nodes(ctx, false);
            return true;
        }
        self.update_lane_vehicle_nodes(ctx, true);
        false
    }

    // ── Integration and lane-change execution ─────────────────────────────

    /// Integrate the commanded acceleration and the lane-change kinematics
    /// into a fresh runtime.  Returns `true` when the route ran out.
    fn refresh_runtime(&mut self, ctx: &WorldCtx<'_>, stats: &StatsCell) -> bool {
        let map = ctx.map;
        let snap_v = ctx.snapshots[self.id.index()].v;
        let ac = self.runtime.action;
        let (v, d) = compute_v_and_distance(snap_v, ac.a, ctx.dt);

        // Ackermann steering toward the neighboring lane.
        let cur_lane = self.runtime.lane.expect("driving person has a lane");
        let mut lane_width = map.lane(cur_lane).width();
        if let Some(target) = ac.lc_target {
            lane_width = (map.lane(cur_lane).width() + map.lane(target).width()) / 2.0;
        }
        if let Some(shadow) = self.runtime.lc.shadow_lane.filter(|_| self.runtime.lc.is_lc) {
            lane_width = (map.lane(cur_lane).width() + map.lane(shadow).width()) / 2.0;
        }
        let max_yaw = (std::f64::consts::FRAC_PI_6)
            .min((lane_width / self.vehicle_attrs.length).min(1.0).asin());
        let d_yaw = d / (self.vehicle_attrs.length / 2.0) * ac.lc_phi.tan();
        let old_yaw = if self.runtime.lc.is_lc { self.runtime.lc.yaw } else { 0.0 };
        let lc_yaw = (old_yaw + d_yaw).min(max_yaw);
        let mean_yaw = (old_yaw + lc_yaw) / 2.0;
        let dw = d * mean_yaw.sin();
        let ds = d * mean_yaw.cos();

        let mut rt = self.runtime;
        if let Some(target) = ac.lc_target {
            apply_lane_change_command(ctx, &mut rt, target, self.id);
        }
        let skip_to_end = self.drive_straight(ctx, &mut rt, ds);
        if rt.lc.is_lc {
            let lane = rt.lane.expect("driving person has a lane");
            let shadow = rt.lc.shadow_lane.expect("lane change has a shadow lane");
            let all_width = (map.lane(lane).width() + map.lane(shadow).width()) / 2.0;
            let ratio = rt.lc.completed_ratio + dw / all_width;
            if ratio >= 1.0 {
                rt.clear_lane_change();
            } else {
                rt.lc.completed_ratio = ratio;
                rt.lc.shadow_s = map.lane(shadow).project_from(map.lane(lane), rt.s);
                rt.lc.yaw = lc_yaw;
            }
        }

        // World position: interpolate between the two lanes mid-change.
        let lane = rt.lane.expect("driving person has a lane");
        let mut xyz = map.lane(lane).position_at(rt.s);
        if rt.lc.is_lc {
            let shadow = rt.lc.shadow_lane.expect("lane change has a shadow lane");
            let shadow_xyz = map.lane(shadow).position_at(rt.lc.shadow_s);
            xyz = mts_core::geom::blend(shadow_xyz, xyz, rt.lc.completed_ratio);
        }
        rt.xyz = xyz;

        self.runtime = rt;
        self.runtime.v = v;
        stats.record_running(ctx.dt, ds);
        skip_to_end
    }

    /// Advance the arc position, crossing lane boundaries through the
    /// route.  Returns `true` when the route is exhausted.
    fn drive_straight(&mut self, ctx: &WorldCtx<'_>, rt: &mut Runtime, ds: f64) -> bool {
        let snap_s = ctx.snapshots[self.id.index()].s;
        let mut s = rt.s + ds;
        let mut lane = rt.lane.expect("driving person has a lane");
        if s > ctx.map.lane(lane).length() {
            if rt.lc.is_lc {
                tracing::debug!("vehicle {} crossed out of an unfinished lane change", self.id);
            }
            rt.clear_lane_change();
            let route = self.route.vehicle.as_mut().expect("driving person has a route");
            while s > ctx.map.lane(lane).length() {
                s -= ctx.map.lane(lane).length();
                match route.next(ctx.map, lane, snap_s) {
                    Some(next) => lane = next,
                    None => return true,
                }
            }
        }
        rt.lane = Some(lane);
        rt.s = s;
        false
    }

    /// Snap to the trip end once within range (or when the route ran out).
    fn check_close_to_end(&mut self, ctx: &WorldCtx<'_>, skip_to_end: bool) -> bool {
        let route = self.route.vehicle.as_ref().expect("driving person has a route");
        let end_lane = route.end.lane.expect("route end is resolved");
        let cur_lane = self.runtime.lane.expect("driving person has a lane");
        let same_road = match (
            ctx.map.lane(cur_lane).parent_road(),
            ctx.map.lane(end_lane).parent_road(),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        if skip_to_end || (same_road && route.end.s - self.runtime.s <= CLOSE_TO_END) {
            self.runtime.lane = Some(end_lane);
            self.runtime.s = route.end.s;
            self.runtime.v = 0.0;
            self.runtime.clear_lane_change();
            if skip_to_end {
                tracing::debug!("vehicle {} snapped to its trip end", self.id);
            }
            true
        } else {
            false
        }
    }

    // ── Node bookkeeping ──────────────────────────────────────────────────

    /// Reconcile this vehicle's lane-queue nodes with the step's movement.
    ///
    /// Crossing a lane boundary removes the old node and adds a fresh one
    /// (never moves), so a remove and an add on the same queue in the same
    /// step target different entries.  With `maintain = false` every node is
    /// withdrawn (trip end, simulation end).
    pub(crate) fn update_lane_vehicle_nodes(&self, ctx: &WorldCtx<'_>, maintain: bool) {
        let snap = &ctx.snapshots[self.id.index()];
        let rt = &self.runtime;
        if maintain {
            if snap.lane != rt.lane {
                if let Some(old) = snap.lane {
                    ctx.map.lane(old).vehicles.remove(self.id);
                }
                if let Some(new) = rt.lane {
                    ctx.map.lane(new).vehicles.add(rt.s, self.id);
                }
            }
            match (snap.lc.in_shadow_lane(), rt.lc.in_shadow_lane()) {
                (false, false) => {}
                (true, false) => {
                    let shadow = snap.lc.shadow_lane.expect("shadow state has a lane");
                    ctx.map.lane(shadow).vehicles.remove(self.id);
                }
                (false, true) => {
                    let shadow = rt.lc.shadow_lane.expect("shadow state has a lane");
                    ctx.map.lane(shadow).vehicles.add(rt.lc.shadow_s, self.id);
                }
                (true, true) => {
                    let old = snap.lc.shadow_lane.expect("shadow state has a lane");
                    let new = rt.lc.shadow_lane.expect("shadow state has a lane");
                    if old != new {
                        ctx.map.lane(old).vehicles.remove(self.id);
                        ctx.map.lane(new).vehicles.add(rt.lc.shadow_s, self.id);
                    }
                }
            }
        } else {
            if let Some(old) = snap.lane {
                ctx.map.lane(old).vehicles.remove(self.id);
            }
            if snap.lc.in_shadow_lane() {
                let shadow = snap.lc.shadow_lane.expect("shadow state has a lane");
                ctx.map.lane(shadow).vehicles.remove(self.id);
            }
        }
    }
}

/// Apply a lane-change command to the runtime.
///
/// Four re-command cases while already changing: the current lane (no-op),
/// the shadow lane (invert the change), a neighbor of the shadow lane
/// (restart from the shadow side), a neighbor of the current lane (pivot
/// with the current lane as the new shadow).  Any other target is logged and
/// ignored, leaving the change as it was.
fn apply_lane_change_command(
    ctx: &WorldCtx<'_>,
    rt: &mut Runtime,
    target: mts_core::LaneId,
    id: mts_core::PersonId,
) {
    let map = ctx.map;
    if map.lane(target).kind() != LaneKind::Driving {
        tracing::error!("vehicle {id} commanded onto non-driving lane {target}, ignored");
        return;
    }
    let cur = rt.lane.expect("driving person has a lane");
    if rt.lc.is_lc {
        let shadow = rt.lc.shadow_lane.expect("lane change has a shadow lane");
        if target == cur {
            // Case 1: already heading there.
        } else if target == shadow {
            // Case 2: abort by inverting the completed ratio.
            rt.lc.completed_ratio = 1.0 - rt.lc.completed_ratio;
            std::mem::swap(&mut rt.s, &mut rt.lc.shadow_s);
            rt.lane = Some(shadow);
            rt.lc.shadow_lane = Some(cur);
        } else if Some(target) == map.lane(shadow).neighbor(mts_core::Side::Left)
            || Some(target) == map.lane(shadow).neighbor(mts_core::Side::Right)
        {
            // Case 3: restart toward the new target from the shadow side.
            rt.lc = LcState {
                is_lc: true,
                shadow_lane: Some(shadow),
                shadow_s: rt.lc.shadow_s,
                yaw: 0.0,
                completed_ratio: 0.0,
            };
            rt.lane = Some(target);
            rt.s = map.lane(target).project_from(map.lane(shadow), rt.lc.shadow_s);
        } else if Some(target) == map.lane(cur).neighbor(mts_core::Side::Left)
            || Some(target) == map.lane(cur).neighbor(mts_core::Side::Right)
        {
            // Case 4: pivot; the lane being crossed becomes the new shadow.
            let s = rt.s;
            rt.lc = LcState {
                is_lc: true,
                shadow_lane: Some(cur),
                shadow_s: 0.0,
                yaw: 0.0,
                completed_ratio: 0.0,
            };
            rt.s = map.lane(target).project_from(map.lane(cur), s);
            rt.lane = Some(target);
        } else {
            tracing::error!(
                "vehicle {id} commanded onto non-neighbor lane {target} from {cur}, ignored"
            );
        }
    } else {
        // Fresh change: the current lane becomes the shadow.
        let s = rt.s;
        rt.lc = LcState {
            is_lc: true,
            shadow_lane: Some(cur),
            shadow_s: 0.0,
            yaw: 0.0,
            completed_ratio: 0.0,
        };
        rt.s = map.lane(target).project_from(map.lane(cur), s);
        rt.lane = Some(target);
    }

    // Status is unchanged; the shadow arc is recomputed after the
    // longitudinal move.
    debug_assert_eq!(rt.status, Status::Driving);
}
