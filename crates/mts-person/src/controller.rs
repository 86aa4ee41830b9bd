//! The vehicle controller: perception and the longitudinal decision.
//!
//! Each step the controller builds an *environment* for the current lane
//! (and, while changing lanes, for the shadow lane): a lookahead chain of
//! downstream lanes within view distance, the perceived leader, and the
//! signal constraints along the chain.  Policies emit candidate [`Action`]s
//! that merge by most-conservative-acceleration; the lateral decision is
//! delegated to [`plan_lane_change`](VehicleController::plan_lane_change).

use smallvec::SmallVec;

use mts_core::{LaneId, LightState, PersonId, PersonRng, Side};
use mts_map::{Lane, Node, SideLinks};
use mts_route::VehicleRoute;

use crate::attr::VehicleAttrs;
use crate::manager::WorldCtx;
use crate::runtime::{Action, Runtime};

// ── Constants ─────────────────────────────────────────────────────────────────

/// IDM free-flow exponent.
const IDM_THETA: i32 = 4;
/// Observation distance is the distance covered in this many seconds.
const VIEW_DISTANCE_FACTOR: f64 = 12.0;
/// Minimum observation distance (m).
const MIN_VIEW_DISTANCE: f64 = 50.0;
/// Largest acceleration perturbation (m/s²).
const MAX_NOISE_A: f64 = 0.5;
/// Accelerations smaller than this are left unperturbed (m/s²).
const ZERO_A_THRESHOLD: f64 = 0.1;

// ── Environment ───────────────────────────────────────────────────────────────

/// A perceived vehicle.
#[derive(Copy, Clone, Debug)]
pub(crate) struct EnvVehicle {
    /// Snapshot speed (m/s).
    pub v: f64,
    /// Vehicle length (m); 0 for non-driving agents.
    pub length: f64,
    /// Arc position on its lane (m).
    pub s: f64,
    /// Gap from our position to its rear (m).
    pub distance: f64,
}

/// A downstream lane within view.
#[derive(Copy, Clone, Debug)]
pub(crate) struct EnvLane {
    pub lane: LaneId,
    /// Distance from our position to the lane's start (m).
    pub distance: f64,
}

/// Everything the controller perceives from one lane position.
pub(crate) struct Env {
    pub lane: LaneId,
    pub s: f64,
    pub ahead_lanes: SmallVec<[EnvLane; 4]>,
    pub ahead: Option<EnvVehicle>,
}

// ── VehicleController ─────────────────────────────────────────────────────────

/// Per-person longitudinal/lateral decision state.
pub struct VehicleController {
    pub(crate) usual_braking_a: f64,
    pub(crate) max_braking_a: f64,
    pub(crate) max_a: f64,
    pub(crate) max_v: f64,
    pub(crate) lane_max_v_ratio: f64,
    pub(crate) length: f64,
    pub(crate) min_gap: f64,
    pub(crate) headway: f64,

    /// Forced lane-change mode: set when the remaining road cannot fit the
    /// required changes, released once the vehicle is in the candidate set.
    pub(crate) force_lc: bool,
    /// Time of the last commanded change (s).
    pub(crate) last_lc_time: f64,

    // Refreshed at the start of every decision.
    pub(crate) v: f64,
    pub(crate) dt: f64,
}

impl VehicleController {
    pub fn new(attrs: &VehicleAttrs) -> Self {
        Self {
            usual_braking_a: attrs.usual_braking_acc,
            max_braking_a: attrs.max_braking_acc,
            max_a: attrs.max_acc,
            max_v: attrs.max_speed,
            lane_max_v_ratio: attrs.lane_max_speed_recognition,
            length: attrs.length,
            min_gap: attrs.min_gap,
            headway: attrs.headway,
            force_lc: false,
            last_lc_time: f64::NEG_INFINITY,
            v: 0.0,
            dt: 1.0,
        }
    }

    // ── Car-following model ───────────────────────────────────────────────

    /// IDM: acceleration from own speed, target speed, leader speed, and
    /// gap.  A non-positive gap is an emergency (clamped to max braking).
    pub(crate) fn follow_impl(
        &self,
        self_v: f64,
        target_v: f64,
        ahead_v: f64,
        distance: f64,
        min_gap: f64,
        headway: f64,
    ) -> f64 {
        let acc = if distance <= 0.0 {
            f64::NEG_INFINITY
        } else {
            let s_star = min_gap
                + (self_v * headway
                    + self_v * (self_v - ahead_v)
                        / (2.0 * (-self.usual_braking_a * self.max_a).sqrt()))
                .max(0.0);
            self.max_a
                * (1.0 - (self_v / target_v).powi(IDM_THETA) - (s_star / distance).powi(2))
        };
        acc.clamp(self.max_braking_a, self.max_a)
    }

    /// IDM with this vehicle's gap parameters, for an arbitrary subject
    /// (used to predict other vehicles' reactions).
    pub(crate) fn follow(&self, self_v: f64, target_v: f64, ahead_v: f64, distance: f64) -> f64 {
        self.follow_impl(self_v, target_v, ahead_v, distance, self.min_gap, self.headway)
    }

    /// IDM for this vehicle following a leader `distance` metres ahead.
    pub(crate) fn self_follow(&self, ahead_v: f64, distance: f64, lane_max_v: f64) -> f64 {
        self.follow(self.v, self.max_v.min(lane_max_v), ahead_v, distance)
    }

    /// Deceleration to stop within `distance`, keeping `min_gap` margin.
    /// Stopping plans one time step ahead instead of a following headway.
    pub(crate) fn stop(&self, distance: f64, lane_max_v: f64, min_gap: f64) -> f64 {
        self.follow_impl(self.v, self.max_v.min(lane_max_v), 0.0, distance, min_gap, self.dt)
    }

    /// The lane's speed limit as this driver perceives it.
    pub(crate) fn lane_max_v(&self, lane: &Lane) -> f64 {
        lane.max_v() * self.lane_max_v_ratio
    }

    /// Front-wheel steering angle for a lane change: 30° at standstill down
    /// to 5° at 25 m/s, never below 5°.
    pub(crate) fn lc_phi(v: f64) -> f64 {
        const K: f64 = (5.0 - 25.0) / 25.0;
        const B: f64 = 30.0;
        (K * v + B).max(5.0).to_radians()
    }

    // ── Perception ────────────────────────────────────────────────────────

    pub(crate) fn env_vehicle(ctx: &WorldCtx<'_>, node: &Node<SideLinks>, distance: f64) -> EnvVehicle {
        EnvVehicle {
            v: ctx.snapshots[node.person.index()].v,
            length: ctx.effective_length(node.person),
            s: node.s,
            distance,
        }
    }

    /// Build the environment at (`lane_id`, `s`), optionally seeded with a
    /// known leader.
    ///
    /// The lookahead chain follows the route's junction-lane choice on roads
    /// and the unique successor inside junctions, until the accumulated
    /// distance reaches the view distance.  If no leader was hinted, the
    /// first vehicle of each downstream lane is checked in order.
    pub(crate) fn get_env(
        &self,
        ctx: &WorldCtx<'_>,
        route: &VehicleRoute,
        hint: Option<EnvVehicle>,
        lane_id: LaneId,
        s: f64,
    ) -> Env {
        let view_distance = (self.v * VIEW_DISTANCE_FACTOR).max(MIN_VIEW_DISTANCE);
        let mut env = Env {
            lane: lane_id,
            s,
            ahead_lanes: SmallVec::new(),
            ahead: None,
        };
        let mut scan_distance = ctx.map.lane(lane_id).length() - s;
        let mut cur = lane_id;
        let mut junc_index = 0usize;
        while scan_distance < view_distance {
            if ctx.map.lane(cur).in_junction() {
                match ctx.map.lane(cur).unique_successor() {
                    Some(next) => cur = next,
                    None => {
                        tracing::error!("junction lane {cur} has no unique successor");
                        break;
                    }
                }
                junc_index += 1;
            } else {
                let (next, _) = route.junction_lane_by_pre_lane(ctx.map, cur, junc_index);
                match next {
                    Some(next) => cur = next,
                    None => break,
                }
            }
            env.ahead_lanes.push(EnvLane { lane: cur, distance: scan_distance });
            scan_distance += ctx.map.lane(cur).length();
        }

        env.ahead = hint;
        if env.ahead.is_none() {
            for env_lane in &env.ahead_lanes {
                if let Some(first) = ctx.map.lane(env_lane.lane).vehicles.first() {
                    let length = ctx.effective_length(first.person);
                    env.ahead = Some(Self::env_vehicle(
                        ctx,
                        first,
                        env_lane.distance + first.s - length,
                    ));
                    break;
                }
            }
        }
        env
    }

    /// Environments of the left and right neighbor lanes, using the
    /// neighbor links for the leader and proportional projection for the
    /// arc position.
    pub(crate) fn get_side_envs(
        &self,
        ctx: &WorldCtx<'_>,
        route: &VehicleRoute,
        lane_id: LaneId,
        s: f64,
        links: &SideLinks,
    ) -> [Option<Env>; 2] {
        let mut envs = [None, None];
        let lane = ctx.map.lane(lane_id);
        for side in Side::BOTH {
            let Some(neighbor_id) = lane.neighbor(side) else {
                continue;
            };
            let neighbor = ctx.map.lane(neighbor_id);
            let side_s = neighbor.project_from(lane, s);
            let hint = links[side.index()][1].and_then(|r| {
                ctx.map.lane(r.lane).vehicles.get(r.index as usize).map(|node| {
                    let length = ctx.effective_length(node.person);
                    Self::env_vehicle(ctx, node, node.s - side_s - length)
                })
            });
            envs[side.index()] = Some(self.get_env(ctx, route, hint, neighbor_id, side_s));
        }
        envs
    }

    /// Speed and arc data of a linked neighbor node, `(v, s, length)`.
    pub(crate) fn link_vehicle(
        ctx: &WorldCtx<'_>,
        link: Option<mts_map::NodeRef>,
    ) -> Option<(f64, f64, f64)> {
        link.and_then(|r| {
            ctx.map.lane(r.lane).vehicles.get(r.index as usize).map(|node| {
                (
                    ctx.snapshots[node.person.index()].v,
                    node.s,
                    ctx.effective_length(node.person),
                )
            })
        })
    }

    // ── Longitudinal policies ─────────────────────────────────────────────

    /// Follow the perceived leader (or free-drive toward the speed limit).
    pub(crate) fn policy_car_follow(
        &self,
        ctx: &WorldCtx<'_>,
        lane_id: LaneId,
        ahead: Option<&EnvVehicle>,
    ) -> Action {
        let (ahead_v, distance) = match ahead {
            Some(veh) => (veh.v, veh.distance),
            None => (0.0, f64::INFINITY),
        };
        Action {
            a: self.self_follow(ahead_v, distance, self.lane_max_v(ctx.map.lane(lane_id))),
            ..Default::default()
        }
    }

    /// Stop for red lights — and for yellows that cannot be beaten — on
    /// junction lanes along the lookahead chain.  The stop target keeps an
    /// extra two metres from the junction entry.
    pub(crate) fn policy_lane(
        &self,
        ctx: &WorldCtx<'_>,
        lane_id: LaneId,
        ahead_lanes: &[EnvLane],
        _s: f64,
    ) -> Action {
        let mut ac = Action::default();
        for env_lane in ahead_lanes {
            let lane = ctx.map.lane(env_lane.lane);
            if !lane.in_junction() {
                continue;
            }
            let stop_a = self.stop(
                env_lane.distance,
                self.lane_max_v(ctx.map.lane(lane_id)),
                self.min_gap + 2.0,
            );
            let light = lane.light();
            match light.state {
                LightState::Red => ac.merge(Action { a: stop_a, ..Default::default() }),
                LightState::Yellow => {
                    if light.remaining * self.v <= env_lane.distance {
                        ac.merge(Action { a: stop_a, ..Default::default() });
                    }
                }
                LightState::Green => {}
            }
        }
        ac
    }

    // ── The per-step decision ─────────────────────────────────────────────

    /// Perceive, decide longitudinally, plan the lateral move, and perturb.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn decide(
        &mut self,
        ctx: &WorldCtx<'_>,
        route: &VehicleRoute,
        snap: &Runtime,
        rng: &mut PersonRng,
        id: PersonId,
    ) -> Action {
        let mut ac = Action::default();
        self.v = snap.v;
        self.dt = ctx.dt;

        let Some(lane_id) = snap.lane else {
            tracing::error!("driving person {id} has no lane");
            return ac;
        };
        let lane = ctx.map.lane(lane_id);

        // Own node: leader hint and neighbor links.
        let own_index = lane.vehicles.position(snap.s, id);
        if own_index.is_none() {
            tracing::debug!("person {id} has no node on lane {lane_id} yet");
        }
        let own_links: SideLinks = own_index
            .and_then(|i| lane.vehicles.get(i))
            .map(|n| n.extra)
            .unwrap_or_default();
        let next_hint = own_index.and_then(|i| lane.vehicles.get(i + 1)).map(|node| {
            let length = ctx.effective_length(node.person);
            Self::env_vehicle(ctx, node, node.s - snap.s - length)
        });
        let own_prev = own_index
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| lane.vehicles.get(i))
            .map(|node| Self::env_vehicle(ctx, node, 0.0));

        let env = self.get_env(ctx, route, next_hint, lane_id, snap.s);
        let side_envs = self.get_side_envs(ctx, route, lane_id, snap.s, &own_links);

        // Shadow environment while a change is in progress.
        let shadow_env = if snap.lc.is_lc {
            let shadow_lane = snap.lc.shadow_lane.expect("lane change has a shadow lane");
            let shadow_hint = ctx
                .map
                .lane(shadow_lane)
                .vehicles
                .position(snap.lc.shadow_s, id)
                .and_then(|i| ctx.map.lane(shadow_lane).vehicles.get(i + 1))
                .map(|node| {
                    let length = ctx.effective_length(node.person);
                    Self::env_vehicle(ctx, node, node.s - snap.lc.shadow_s - length)
                });
            Some(self.get_env(ctx, route, shadow_hint, shadow_lane, snap.lc.shadow_s))
        } else {
            None
        };

        if let Some(ahead) = &env.ahead {
            ac.ahead_distance = ahead.distance;
        }

        // Longitudinal: follow, then signal constraints; while changing,
        // the shadow lane constrains too.
        ac.merge(self.policy_car_follow(ctx, env.lane, env.ahead.as_ref()));
        ac.merge(self.policy_lane(ctx, env.lane, &env.ahead_lanes, env.s));
        if let Some(shadow) = &shadow_env {
            if let Some(ahead) = &shadow.ahead {
                ac.merge(self.policy_car_follow(ctx, shadow.lane, Some(ahead)));
            }
            ac.merge(self.policy_lane(ctx, shadow.lane, &shadow.ahead_lanes, shadow.s));
        }

        // Lateral: only when not already changing and outside junctions.
        if !snap.lc.is_lc && !lane.in_junction() {
            ac.merge(self.plan_lane_change(ctx, route, snap, &env, &side_envs, &own_links, own_prev, rng));
        }
        if snap.lc.is_lc {
            ac.lc_phi = Self::lc_phi(self.v);
        }

        // Clamp, then perturb with clipped Gaussian noise that neither
        // touches near-zero accelerations nor flips the sign.  The final
        // clamp keeps the selected acceleration inside the physical
        // envelope even after the perturbation.
        ac.a = ac.a.clamp(self.max_braking_a, self.max_a);
        let noise = MAX_NOISE_A * (0.5 * rng.norm()).clamp(-1.0, 1.0);
        if ac.a.abs() >= ZERO_A_THRESHOLD
            && ac.a.is_sign_negative() == (ac.a + noise).is_sign_negative()
        {
            ac.a = (ac.a + noise).clamp(self.max_braking_a, self.max_a);
        }
        ac
    }
}
