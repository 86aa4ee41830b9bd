//! Max-Pressure controller.
//!
//! Instead of cycling phases in order, each time a phase expires the
//! controller computes every lane's pressure (density on the unique
//! predecessor minus density on the unique successor) and picks the phase
//! whose green lanes carry the largest total.  An unchanged winner extends
//! the current phase in place, up to a repeat cap; a changed winner goes
//! through a transition sequence first.

use mts_core::{JunctionId, LaneId, LightState, SimFlags};
use mts_map::Lane;

use crate::error::{SignalError, SignalResult};

/// Adaptive Max-Pressure phase selection over a junction's available phases.
pub struct MaxPressureController {
    junction: JunctionId,
    /// The lanes the phase states are aligned with.
    lanes: Vec<LaneId>,
    phases: Vec<Vec<LightState>>,

    index: usize,
    repeat_count: u32,
    total: f64,
    remaining: f64,
    snapshot_remaining: f64,
    /// Pending transition phases (pedestrian clear, yellow, all red), front
    /// first, with their durations.
    transition_phases: Vec<Vec<LightState>>,
    transition_times: Vec<f64>,
    /// Phase entered once the transition sequence drains.
    next_index: usize,

    phase_time: f64,
    yellow_time: f64,
    pedestrian_clear_time: f64,
    all_red_time: f64,
    max_repeat_count: u32,

    ok: bool,
    ok_buffer: bool,
}

impl MaxPressureController {
    pub fn new(
        junction: JunctionId,
        lanes: Vec<LaneId>,
        phases: Vec<Vec<LightState>>,
        flags: &SimFlags,
    ) -> Self {
        Self {
            junction,
            lanes,
            phases,
            index: 0,
            repeat_count: 0,
            total: 0.0,
            remaining: 0.0,
            snapshot_remaining: 0.0,
            transition_phases: Vec::new(),
            transition_times: Vec::new(),
            next_index: 0,
            phase_time: flags.mp_phase_time,
            yellow_time: flags.mp_yellow_time,
            pedestrian_clear_time: flags.mp_pedestrian_clear_time,
            all_red_time: flags.mp_all_red_time,
            max_repeat_count: flags.mp_max_repeat_count,
            ok: true,
            ok_buffer: true,
        }
    }

    pub fn set_ok(&mut self, ok: bool) {
        self.ok_buffer = ok;
    }

    #[inline]
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// The current phase index, or `None` while a transition is running.
    pub fn phase_index(&self) -> Option<usize> {
        self.transition_phases.is_empty().then_some(self.index)
    }

    pub fn remaining(&self) -> f64 {
        self.snapshot_remaining
    }

    // ── Prepare / update ──────────────────────────────────────────────────

    /// Snapshot the countdown for this step's light write.
    pub fn prepare(&mut self) {
        self.ok = self.ok_buffer;
        self.snapshot_remaining = self.remaining;
    }

    /// Write this step's light states into the junction's lanes.
    ///
    /// With fewer than two phases there is nothing to arbitrate and the
    /// junction stays all-green.  While a transition phase is running, a lane
    /// that is green now and green in the following phase gets the following
    /// phase's time added, so approaching vehicles do not brake for a
    /// continuation.
    pub fn write_lights(&self, lanes: &mut [Lane]) {
        if self.phases.len() < 2 || !self.ok {
            for &lane in &self.lanes {
                lanes[lane.index()].set_light(LightState::Green, f64::INFINITY, f64::INFINITY);
            }
            return;
        }
        if let Some(phase) = self.transition_phases.first() {
            let next_phase = self
                .transition_phases
                .get(1)
                .unwrap_or(&self.phases[self.next_index]);
            for (i, &lane) in self.lanes.iter().enumerate() {
                if phase[i] == LightState::Green && next_phase[i] == LightState::Green {
                    lanes[lane.index()].set_light(
                        phase[i],
                        self.total + self.phase_time,
                        self.remaining + self.phase_time,
                    );
                } else {
                    lanes[lane.index()].set_light(phase[i], self.total, self.remaining);
                }
            }
        } else {
            let phase = &self.phases[self.index];
            for (i, &lane) in self.lanes.iter().enumerate() {
                lanes[lane.index()].set_light(phase[i], self.total, self.remaining);
            }
        }
    }

    /// Advance the countdown; on expiry either step the transition sequence
    /// or re-select the highest-pressure phase.
    pub fn update(&mut self, dt: f64, lanes: &[Lane]) {
        if self.phases.len() < 2 || !self.ok {
            return;
        }
        self.remaining -= dt;
        if self.remaining > 0.0 {
            return;
        }
        match self.transition_phases.len() {
            1 => {
                // Transition done: enter the selected phase.
                self.index = self.next_index;
                self.remaining += self.phase_time;
                self.transition_phases.clear();
                self.transition_times.clear();
            }
            n if n > 1 => {
                // Next transition phase.
                self.transition_phases.remove(0);
                self.transition_times.remove(0);
                self.remaining += self.transition_times[0];
            }
            _ => self.select_phase(dt, lanes),
        }
        if self.remaining <= 0.0 {
            tracing::warn!(
                "traffic light {} remaining time {} <= 0",
                self.junction,
                self.remaining
            );
        }
        self.total = self.remaining;
    }

    /// Pick the highest-pressure phase; extend in place or build the
    /// transition sequence toward it.
    fn select_phase(&mut self, dt: f64, lanes: &[Lane]) {
        let pressures: Vec<f64> = self
            .lanes
            .iter()
            .map(|&id| lanes[id.index()].pressure(lanes))
            .collect();
        let mut ranked: Vec<(usize, f64)> = self
            .phases
            .iter()
            .enumerate()
            .map(|(i, phase)| {
                let pressure = phase
                    .iter()
                    .zip(&pressures)
                    .filter(|(state, _)| **state == LightState::Green)
                    .map(|(_, p)| p)
                    .sum::<f64>();
                (i, pressure)
            })
            .collect();
        // Highest pressure first; ties resolve to the lowest phase index so
        // runs are reproducible.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut chosen = ranked[0].0;
        if chosen == self.index {
            if self.repeat_count >= self.max_repeat_count {
                chosen = ranked[1].0;
            } else {
                self.remaining += self.phase_time;
                self.repeat_count += 1;
            }
        }
        if chosen == self.index {
            return;
        }

        self.next_index = chosen;
        self.repeat_count = 1;
        let current = &self.phases[self.index];
        let next = &self.phases[chosen];

        let mut clear_phase = current.clone();
        let mut yellow_phase = current.clone();
        let mut all_red_phase = next.clone();
        let mut has_clear = false;
        let mut has_all_red = false;
        for (i, &lane_id) in self.lanes.iter().enumerate() {
            let is_walk = lanes[lane_id.index()].is_walking();
            if current[i] == LightState::Green && next[i] == LightState::Red {
                yellow_phase[i] = LightState::Yellow;
                if is_walk {
                    has_clear = true;
                    clear_phase[i] = LightState::Yellow;
                }
            }
            if current[i] == LightState::Red && next[i] == LightState::Green && !is_walk {
                all_red_phase[i] = LightState::Red;
                has_all_red = true;
            }
        }

        // Each transition runs for at least one step so a single update
        // never consumes several of them.
        self.transition_phases.clear();
        self.transition_times.clear();
        if has_clear {
            self.transition_phases.push(clear_phase);
            self.transition_times.push(self.pedestrian_clear_time.max(dt));
        }
        self.transition_phases.push(yellow_phase);
        self.transition_times.push(self.yellow_time.max(dt));
        if has_all_red {
            self.transition_phases.push(all_red_phase);
            self.transition_times.push(self.all_red_time.max(dt));
        }
        self.remaining += self.transition_times[0];
    }

    /// Programs cannot be installed on a Max-Pressure junction.
    pub fn set(&mut self) -> SignalResult<()> {
        Err(SignalError::MaxPressure(self.junction))
    }
}
