//! Pedestrian progression along directed walking segments.

use crate::manager::{StatsCell, WorldCtx};
use crate::person::Person;

impl Person {
    /// Advance along the walking route.  Returns `true` when the trip ends.
    ///
    /// A red light on the current junction lane doubles the speed (clear the
    /// crossing); a red light on the *next* segment halts at the boundary
    /// until it turns.  Overshoot folds onto the next segment, re-oriented
    /// when the direction flips.
    pub(crate) fn update_pedestrian(&mut self, ctx: &WorldCtx<'_>, stats: &StatsCell) -> bool {
        let map = ctx.map;
        let snap = &ctx.snapshots[self.id.index()];
        let Some(route) = self.route.pedestrian.as_mut() else {
            tracing::error!("pedestrian {} walks without a route", self.id);
            return true;
        };
        let mut lane_id = self.runtime.lane.expect("walking person has a lane");
        let mut seg = route.current();
        let mut s = snap.s;
        let mut v = self.walk_v;
        if map.lane(lane_id).is_no_entry() {
            v *= 2.0; // caught by a red mid-crossing: hurry through
        }
        let ds = v * ctx.dt;
        if seg.is_forward() {
            s += ds;
        } else {
            s -= ds;
        }

        let mut is_end = false;
        loop {
            let length = map.lane(lane_id).length();
            if (0.0..=length).contains(&s) {
                break;
            }
            // Hold at the boundary while the next segment is barred.
            if !route.at_last() {
                if let Some(next) = route.peek_next() {
                    if map.lane(next.lane).is_no_entry() {
                        self.runtime.v = 0.0;
                        return false;
                    }
                }
            }
            if route.step() {
                // Fold the overshoot onto the next segment.
                if s < 0.0 {
                    s = -s;
                } else {
                    s -= length;
                }
                seg = route.current();
                lane_id = seg.lane;
                if !seg.is_forward() {
                    s = map.lane(lane_id).length() - s;
                }
            } else {
                is_end = true;
                break;
            }
        }
        if route.at_last() {
            is_end = if seg.is_forward() {
                s >= route.end.s
            } else {
                s <= route.end.s
            };
        }
        s = s.clamp(0.0, map.lane(lane_id).length());

        if is_end {
            self.runtime.lane = Some(route.last().lane);
            self.runtime.s = route.end.s;
            if let Some(old) = snap.lane {
                map.lane(old).pedestrians.remove(self.id);
            }
            return true;
        }

        self.runtime.is_forward = seg.is_forward();
        self.runtime.lane = Some(lane_id);
        self.runtime.s = s;
        self.runtime.xyz = map.lane(lane_id).position_at(s);
        self.runtime.v = v;

        // Crossing a segment boundary moves the node: remove from the old
        // lane, fresh node on the new one.
        if snap.lane != self.runtime.lane {
            if let Some(old) = snap.lane {
                map.lane(old).pedestrians.remove(self.id);
            }
            map.lane(lane_id).pedestrians.add(s, self.id);
        }
        stats.record_running(ctx.dt, ds);
        false
    }
}
