//! Fixed-program controller.

use mts_core::{JunctionId, LaneId, LightState};
use mts_map::{Lane, LightProgram};

use crate::error::{SignalError, SignalResult};

// ── Runtime state ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct FixedRuntime {
    program: Option<LightProgram>,
    step: usize,
    total: f64,
    remaining: f64,
}

// ── FixedController ───────────────────────────────────────────────────────────

/// Cycles a fixed program of phases over the junction's lanes.
///
/// Program installs, phase overrides, and on/off switches are buffered and
/// take effect at the next *update*, keeping the write-once-per-step light
/// contract intact.
pub struct FixedController {
    junction: JunctionId,
    /// The lanes the program's states are aligned with.
    lanes: Vec<LaneId>,
    /// `time_before_change[lane][phase]`: extra seconds after the phase ends
    /// during which the lane's state does not change (∞ if it never does).
    time_before_change: Vec<Vec<f64>>,
    snapshot: FixedRuntime,
    runtime: FixedRuntime,
    buffer: Option<FixedRuntime>,
    ok: bool,
    ok_buffer: bool,
}

impl FixedController {
    pub fn new(junction: JunctionId, lanes: Vec<LaneId>) -> Self {
        Self {
            junction,
            lanes,
            time_before_change: Vec::new(),
            snapshot: FixedRuntime::default(),
            runtime: FixedRuntime::default(),
            buffer: None,
            ok: true,
            ok_buffer: true,
        }
    }

    /// Install `program`, starting at phase `junction_id % n_phases` so that
    /// adjacent junctions sharing a program are offset from each other.
    /// Buffered: takes effect at the next *update*.
    pub fn set(&mut self, program: LightProgram) -> SignalResult<()> {
        let runtime = self.validate(program)?;
        self.buffer = Some(runtime);
        Ok(())
    }

    /// Install `program` immediately (construction time, before the first
    /// step).
    pub fn set_initial(&mut self, program: LightProgram) -> SignalResult<()> {
        let runtime = self.validate(program)?;
        self.time_before_change = Self::change_table(
            runtime.program.as_ref().expect("validated"),
            self.lanes.len(),
        );
        self.runtime = runtime;
        Ok(())
    }

    fn validate(&self, program: LightProgram) -> SignalResult<FixedRuntime> {
        if program.phases.is_empty() {
            return Err(SignalError::EmptyProgram);
        }
        for (i, phase) in program.phases.iter().enumerate() {
            if phase.states.len() != self.lanes.len() {
                return Err(SignalError::WrongLaneCount {
                    phase: i,
                    got: phase.states.len(),
                    expected: self.lanes.len(),
                });
            }
        }
        let step = self.junction.index() % program.phases.len();
        let duration = program.phases[step].duration;
        Ok(FixedRuntime {
            program: Some(program),
            step,
            total: duration,
            remaining: duration,
        })
    }

    /// Drop the program; the junction goes all-green at the next update.
    pub fn unset(&mut self) {
        self.buffer = Some(FixedRuntime::default());
    }

    /// Override the current phase index and remaining time.
    pub fn set_phase(&mut self, step: usize, remaining: f64) {
        if self.runtime.program.is_none() {
            return;
        }
        match &mut self.buffer {
            Some(buf) => {
                buf.step = step;
                buf.remaining = remaining;
            }
            None => {
                self.buffer = Some(FixedRuntime {
                    program: self.runtime.program.clone(),
                    step,
                    total: remaining,
                    remaining,
                });
            }
        }
    }

    pub fn set_ok(&mut self, ok: bool) {
        self.ok_buffer = ok;
    }

    #[inline]
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn program(&self) -> Option<&LightProgram> {
        self.snapshot.program.as_ref()
    }

    pub fn phase_index(&self) -> usize {
        self.snapshot.step
    }

    pub fn remaining(&self) -> f64 {
        self.snapshot.remaining
    }

    // ── Prepare / update ──────────────────────────────────────────────────

    /// Snapshot the runtime for this step's light write.
    pub fn prepare(&mut self) {
        self.ok = self.ok_buffer;
        self.snapshot = self.runtime.clone();
    }

    /// Write this step's light states into the junction's lanes.
    pub fn write_lights(&self, lanes: &mut [Lane]) {
        match (&self.snapshot.program, self.ok) {
            (Some(program), true) => {
                let phase = &program.phases[self.snapshot.step];
                for (i, &lane) in self.lanes.iter().enumerate() {
                    let ahead = self.time_before_change[i][self.snapshot.step];
                    lanes[lane.index()].set_light(
                        phase.states[i],
                        self.snapshot.total + ahead,
                        self.snapshot.remaining + ahead,
                    );
                }
            }
            _ => {
                for &lane in &self.lanes {
                    lanes[lane.index()].set_light(LightState::Green, f64::INFINITY, f64::INFINITY);
                }
            }
        }
    }

    /// Advance the countdown; apply any buffered install or override first.
    pub fn update(&mut self, dt: f64) {
        if let Some(buffer) = self.buffer.take() {
            self.runtime = buffer;
            if let Some(program) = &self.runtime.program {
                self.time_before_change = Self::change_table(program, self.lanes.len());
            }
        }
        if self.runtime.program.is_none() || !self.ok {
            return;
        }
        self.runtime.remaining -= dt;
        if self.runtime.remaining <= 0.0 {
            let program = self.runtime.program.as_ref().expect("checked above");
            let n = program.phases.len();
            self.runtime.remaining = 0.0;
            self.runtime.total = 0.0;
            // Cyclic advance, skipping zero-duration phases.
            loop {
                self.runtime.step = (self.runtime.step + 1) % n;
                self.runtime.remaining += program.phases[self.runtime.step].duration;
                if self.runtime.remaining > 0.0 {
                    self.runtime.total = self.runtime.remaining;
                    break;
                }
            }
        }
    }

    /// Seconds after each phase's end during which each lane keeps its
    /// state, cyclically; ∞ for lanes that never change.
    fn change_table(program: &LightProgram, lane_count: usize) -> Vec<Vec<f64>> {
        let n = program.phases.len();
        let mut table = Vec::with_capacity(lane_count);
        for lane in 0..lane_count {
            let states: Vec<LightState> =
                program.phases.iter().map(|p| p.states[lane]).collect();
            let all_same = states.windows(2).all(|w| w[0] == w[1]);
            if all_same {
                table.push(vec![f64::INFINITY; n]);
                continue;
            }
            let mut times = vec![0.0; n];
            for (p, time) in times.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut q = (p + 1) % n;
                while states[q] == states[p] {
                    sum += program.phases[q].duration;
                    q = (q + 1) % n;
                }
                *time = sum;
            }
            table.push(times);
        }
        table
    }
}
