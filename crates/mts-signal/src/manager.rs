//! The per-junction controller table and its phase drivers.

use mts_core::{JunctionId, LaneId, SimConfig};
use mts_map::{Lane, LightProgram, MapData};

use crate::error::{SignalError, SignalResult};
use crate::fixed::FixedController;
use crate::max_pressure::MaxPressureController;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ── Controller ────────────────────────────────────────────────────────────────

/// The signal controller attached to one junction.
pub enum Controller {
    /// No program and no phases: the junction's lanes stay at their initial
    /// all-green and are never written.
    None,
    Fixed(FixedController),
    MaxPressure(MaxPressureController),
}

impl Controller {
    fn prepare(&mut self) {
        match self {
            Controller::None => {}
            Controller::Fixed(c) => c.prepare(),
            Controller::MaxPressure(c) => c.prepare(),
        }
    }

    fn write_lights(&self, lanes: &mut [Lane]) {
        match self {
            Controller::None => {}
            Controller::Fixed(c) => c.write_lights(lanes),
            Controller::MaxPressure(c) => c.write_lights(lanes),
        }
    }

    fn update(&mut self, dt: f64, lanes: &[Lane]) {
        match self {
            Controller::None => {}
            Controller::Fixed(c) => c.update(dt),
            Controller::MaxPressure(c) => c.update(dt, lanes),
        }
    }

    /// `true` when the controller exists and is switched on.
    pub fn ok(&self) -> bool {
        match self {
            Controller::None => false,
            Controller::Fixed(c) => c.ok(),
            Controller::MaxPressure(c) => c.ok(),
        }
    }
}

// ── SignalState ───────────────────────────────────────────────────────────────

/// Observable controller state, as returned to outside callers.
#[derive(Clone, Debug, Default)]
pub struct SignalState {
    /// The installed program (fixed controller only).
    pub program: Option<LightProgram>,
    /// Current phase index; `None` for adaptive control or mid-transition.
    pub phase_index: Option<usize>,
    /// Remaining time of the current phase (s).
    pub remaining: f64,
    /// Whether the controller is switched on.
    pub ok: bool,
}

// ── SignalManager ─────────────────────────────────────────────────────────────

/// Owns one [`Controller`] per junction, indexed by `JunctionId`.
pub struct SignalManager {
    controllers: Vec<Controller>,
}

impl SignalManager {
    /// Build the controller table from the map's junctions.
    ///
    /// A junction gets its fixed program when `prefer_fixed_light` is set and
    /// a non-empty program exists; otherwise the Max-Pressure controller over
    /// its available phases; otherwise no control at all.
    ///
    /// # Panics
    /// Panics if a junction's fixed program does not match its lane count —
    /// programs are validated when the map is built.
    pub fn new(map: &MapData, config: &SimConfig) -> Self {
        let controllers = map
            .junctions
            .iter()
            .map(|junction| {
                let lanes: Vec<LaneId> = junction.lanes().to_vec();
                if config.prefer_fixed_light {
                    if let Some(program) = junction.fixed_program() {
                        if !program.phases.is_empty() {
                            let mut fixed = FixedController::new(junction.id(), lanes);
                            fixed
                                .set_initial(program.clone())
                                .unwrap_or_else(|e| panic!("junction {}: {e}", junction.id()));
                            return Controller::Fixed(fixed);
                        }
                    }
                }
                if !junction.phases().is_empty() {
                    return Controller::MaxPressure(MaxPressureController::new(
                        junction.id(),
                        lanes,
                        junction.phases().to_vec(),
                        &config.flags,
                    ));
                }
                Controller::None
            })
            .collect();
        Self { controllers }
    }

    pub fn controller(&self, junction: JunctionId) -> &Controller {
        &self.controllers[junction.index()]
    }

    /// Junction *prepare*: snapshot every controller in parallel, then write
    /// each junction's lane lights sequentially (each lane belongs to exactly
    /// one junction, so every light is written exactly once).
    pub fn prepare(&mut self, lanes: &mut [Lane]) {
        #[cfg(feature = "parallel")]
        self.controllers.par_iter_mut().for_each(Controller::prepare);
        #[cfg(not(feature = "parallel"))]
        self.controllers.iter_mut().for_each(Controller::prepare);

        for controller in &self.controllers {
            controller.write_lights(lanes);
        }
    }

    /// Junction *update*: advance every controller against the read-only
    /// lane state.
    pub fn update(&mut self, dt: f64, lanes: &[Lane]) {
        #[cfg(feature = "parallel")]
        self.controllers
            .par_iter_mut()
            .for_each(|c| c.update(dt, lanes));
        #[cfg(not(feature = "parallel"))]
        self.controllers.iter_mut().for_each(|c| c.update(dt, lanes));
    }

    // ── Control surface ───────────────────────────────────────────────────

    /// Observable state of a junction's controller.
    pub fn state(&self, junction: JunctionId) -> SignalState {
        match &self.controllers[junction.index()] {
            Controller::None => SignalState::default(),
            Controller::Fixed(c) => SignalState {
                program: c.program().cloned(),
                phase_index: Some(c.phase_index()),
                remaining: c.remaining(),
                ok: c.ok(),
            },
            Controller::MaxPressure(c) => SignalState {
                program: None,
                phase_index: c.phase_index(),
                remaining: c.remaining(),
                ok: c.ok(),
            },
        }
    }

    /// Install a program; an empty program unsets control (all green).
    pub fn set_program(&mut self, junction: JunctionId, program: LightProgram) -> SignalResult<()> {
        match &mut self.controllers[junction.index()] {
            Controller::None => Err(SignalError::Disabled(junction)),
            Controller::MaxPressure(c) => c.set(),
            Controller::Fixed(c) => {
                if program.phases.is_empty() {
                    c.unset();
                    Ok(())
                } else {
                    c.set(program)
                }
            }
        }
    }

    /// Override the current phase and remaining time.
    pub fn set_phase(&mut self, junction: JunctionId, phase: usize, remaining: f64) -> SignalResult<()> {
        if remaining < 0.0 {
            return Err(SignalError::InvalidRemaining(remaining));
        }
        match &mut self.controllers[junction.index()] {
            Controller::None => Err(SignalError::Disabled(junction)),
            Controller::MaxPressure(_) => Ok(()), // adaptive control ignores overrides
            Controller::Fixed(c) => {
                c.set_phase(phase, remaining);
                Ok(())
            }
        }
    }

    /// Switch a controller on or off (off = all green).
    pub fn set_ok(&mut self, junction: JunctionId, ok: bool) -> SignalResult<()> {
        match &mut self.controllers[junction.index()] {
            Controller::None => Err(SignalError::Disabled(junction)),
            Controller::Fixed(c) => {
                c.set_ok(ok);
                Ok(())
            }
            Controller::MaxPressure(c) => {
                c.set_ok(ok);
                Ok(())
            }
        }
    }
}
