//! The lateral decision: forced lane changes near route constraints and
//! discretionary changes by the MOBIL incentive rule.

use mts_core::{PersonRng, Side};
use mts_map::SideLinks;
use mts_route::VehicleRoute;

use crate::controller::{Env, EnvVehicle, VehicleController};
use crate::manager::WorldCtx;
use crate::runtime::{Action, Runtime};

// ── Constants ─────────────────────────────────────────────────────────────────

/// A change is expected to need this many seconds of travel.
const LC_LENGTH_FACTOR: f64 = 5.0;
/// Slack added to the usual braking limit when judging follower safety.
const LC_SAFE_BRAKING_A_BIAS: f64 = 1.0;
/// No discretionary changes within this distance of the lane end (m).
const LC_LANE_END: f64 = 20.0;
/// Minimum cool-down between changes (s); extended by up to 2 s of noise.
const LC_COOLDOWN: f64 = 4.0;

impl VehicleController {
    /// Decide whether to start a lane change this step.
    ///
    /// Forced mode engages when the remaining road minus the route's
    /// reserve cannot fit the required number of changes; it follows the
    /// target side's traffic and starts the change regardless of incentive,
    /// braking hard if the target follower would otherwise collide.
    /// Otherwise MOBIL weighs own gain against the followers' losses and
    /// samples a side with the mapped probability.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn plan_lane_change(
        &mut self,
        ctx: &WorldCtx<'_>,
        route: &VehicleRoute,
        snap: &Runtime,
        env: &Env,
        side_envs: &[Option<Env>; 2],
        links: &SideLinks,
        own_prev: Option<EnvVehicle>,
        rng: &mut PersonRng,
    ) -> Action {
        let mut ac = Action::default();
        let lane = ctx.map.lane(env.lane);
        let reverse_s = lane.length() - env.s;
        let max_v = self.lane_max_v(lane);
        let lc_length = (self.v * LC_LENGTH_FACTOR).max(self.length);

        let lc = route.lc_scan(ctx.map, env.lane, snap.s);
        if !lc.in_candidate
            && reverse_s - lc.delta_lc_distance <= lc_length * lc.count as f64
        {
            // Too little road left to postpone the change.
            self.force_lc = true;
        } else if lc.in_candidate && self.force_lc {
            self.force_lc = false;
        }

        if self.force_lc {
            let Some(side_env) = &side_envs[lc.side.index()] else {
                tracing::error!(
                    "forced lane change toward {} from {} has no side lane",
                    lc.side,
                    env.lane
                );
                return ac;
            };
            let target = side_env.lane;
            self.last_lc_time = ctx.t;
            // Longitudinal control switches to the target lane's traffic.
            if let Some(ahead) = &side_env.ahead {
                ac.merge(self.policy_car_follow(ctx, side_env.lane, Some(ahead)));
            }
            ac.merge(self.policy_lane(ctx, side_env.lane, &side_env.ahead_lanes, side_env.s));
            // If the target-side follower would have to brake beyond its
            // comfort to admit us, stop and let it pass first.
            if let Some((v3, s3, _)) = Self::link_vehicle(ctx, links[lc.side.index()][0]) {
                let an3 = self.follow(v3, max_v, self.v, side_env.s - self.length - s3);
                if an3 < (self.usual_braking_a + LC_SAFE_BRAKING_A_BIAS).min(-1.0) {
                    ac.merge(Action { a: self.max_braking_a, ..Default::default() });
                    ac.start_lane_change(target, 0.0);
                    return ac;
                }
            }
            if ac.lc_target.is_none() {
                ac.merge(Action { a: self.usual_braking_a, ..Default::default() });
                ac.start_lane_change(target, 0.0);
            }
            return ac;
        }

        // Discretionary (MOBIL).
        if reverse_s < LC_LANE_END {
            return ac;
        }
        if ctx.t - self.last_lc_time < rng.uniform() * 2.0 + LC_COOLDOWN {
            return ac;
        }
        if side_envs[0].is_none() && side_envs[1].is_none() {
            return ac;
        }

        // Current acceleration against the current leader.
        let (v1, s1) = match &env.ahead {
            Some(ahead) => (ahead.v, ahead.s - ahead.length),
            None => (f64::INFINITY, f64::INFINITY),
        };
        let a0 = self.self_follow(v1, s1 - env.s, max_v);
        // Our follower's change of acceleration if we leave.
        let mut delta_a2 = 0.0;
        if let Some(prev) = own_prev {
            let (v2, s2) = (prev.v, prev.s);
            delta_a2 = self.follow(v2, max_v, v1, s1 - s2)
                - self.follow(v2, max_v, self.v, env.s - self.length - s2);
        }

        let mut deltas = [0.0f64; 2];
        let mut an0s = [0.0f64; 2];
        for side in Side::BOTH {
            let Some(side_env) = &side_envs[side.index()] else {
                continue;
            };
            if lc.in_candidate {
                // Already lined up: do not leave the candidate set.
                if lc.neighbors[side.index()] <= 0 {
                    continue;
                }
            } else if side != lc.side {
                // Not lined up: only move toward the required side.
                continue;
            }
            // Our acceleration after the change.
            let (v4, s4) = match Self::link_vehicle(ctx, links[side.index()][1]) {
                Some((v, s, length)) => (v, s - length),
                None => (f64::INFINITY, f64::INFINITY),
            };
            let sn0 = side_env.s;
            let an0 = self.self_follow(v4, s4 - sn0, max_v);
            an0s[side.index()] = an0;
            let delta_a0 = an0 - a0;
            // The target-side follower's change.
            let mut delta_a3 = 0.0;
            if let Some((v3, s3, _)) = Self::link_vehicle(ctx, links[side.index()][0]) {
                let an3 = self.follow(v3, max_v, self.v, sn0 - self.length - s3);
                if an3 < self.usual_braking_a + LC_SAFE_BRAKING_A_BIAS {
                    continue; // would force the follower into a hard brake
                }
                delta_a3 = an3 - self.follow(v3, max_v, v4, s4 - s3);
            }
            let delta = delta_a0 + 0.1 * (delta_a2 + delta_a3);
            if delta > 0.0 {
                deltas[side.index()] = delta;
            }
        }

        let u = deltas[0] + deltas[1];
        let p_lc = if u >= 1.0 {
            0.9
        } else if u > 0.0 {
            (0.9 - 2e-8) * u
        } else {
            // No incentive either way; keep existing sides samplable at the
            // floor probability.
            if side_envs[0].is_some() {
                deltas[0] = 1.0;
            }
            if side_envs[1].is_some() {
                deltas[1] = 1.0;
            }
            2e-8
        };
        if rng.p_true(p_lc) {
            let side = rng.discrete(&deltas);
            let Some(side_env) = &side_envs[side] else {
                return ac;
            };
            ac = Action { a: an0s[side], ..Default::default() };
            ac.merge(self.policy_lane(ctx, side_env.lane, &side_env.ahead_lanes, side_env.s));
            self.last_lc_time = ctx.t;
            ac.start_lane_change(side_env.lane, 0.0);
        }
        ac
    }
}
