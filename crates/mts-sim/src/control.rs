//! The remote-control surface: per-person and per-junction operations
//! exposed to outside controllers.
//!
//! Every operation validates its arguments and reports misuse as a typed
//! error (the RPC façade maps these to invalid-argument responses); nothing
//! here can abort the simulation.

use mts_core::{JunctionId, PersonId};
use mts_map::LightProgram;
use mts_person::{GlobalStats, PersonSpec, Runtime, Status};
use mts_route::PositionSpec;
use mts_schedule::ScheduleEntry;
use mts_signal::{SignalError, SignalState};
use thiserror::Error;

use crate::sim::Simulation;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("person id does not exist")]
    UnknownPerson(PersonId),

    #[error("junction id does not exist")]
    UnknownJunction(JunctionId),

    #[error("position references an unknown lane or aoi")]
    UnknownPosition,

    #[error("person is not sleeping")]
    NotSleeping(PersonId),

    #[error("person in a junction lane does not support schedule setting")]
    InJunction(PersonId),

    #[error("invalid person: {0}")]
    BadPerson(#[from] mts_person::PersonError),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Filters for the person listing.
#[derive(Clone, Debug, Default)]
pub struct PersonFilter {
    /// When non-empty, only these ids are returned.
    pub ids: Vec<PersonId>,
    /// Persons in any of these states are omitted.
    pub exclude_statuses: Vec<Status>,
}

// ── Control surface ───────────────────────────────────────────────────────────

impl Simulation {
    /// A person's committed state as of the last *prepare*.
    pub fn person_runtime(&self, id: PersonId) -> ControlResult<Runtime> {
        self.persons
            .person_or_err(id)
            .map_err(|_| ControlError::UnknownPerson(id))?;
        Ok(*self.persons.snapshot(id))
    }

    /// List persons, optionally restricted by id and filtered by status.
    pub fn list_persons(&self, filter: &PersonFilter) -> Vec<(PersonId, Runtime)> {
        self.persons
            .iter()
            .filter(|p| filter.ids.is_empty() || filter.ids.contains(&p.id()))
            .filter(|p| {
                !filter
                    .exclude_statuses
                    .contains(&self.persons.snapshot(p.id()).status)
            })
            .map(|p| (p.id(), *self.persons.snapshot(p.id())))
            .collect()
    }

    /// Admit a new person.
    pub fn add_person(&mut self, spec: PersonSpec) -> ControlResult<PersonId> {
        let id = self
            .persons
            .add_person(&self.map, spec, &self.config.flags, self.clock.t)?;
        Ok(id)
    }

    /// Replace a person's schedule.  Rejected while the person occupies a
    /// junction lane (mid-junction rerouting has no well-defined restart
    /// lane).
    pub fn set_schedule(
        &mut self,
        id: PersonId,
        entries: Vec<ScheduleEntry>,
    ) -> ControlResult<()> {
        let in_junction = {
            let person = self
                .persons
                .person_or_err(id)
                .map_err(|_| ControlError::UnknownPerson(id))?;
            person
                .runtime
                .lane
                .map(|l| self.map.lane(l).in_junction())
                .unwrap_or(false)
        };
        if in_junction {
            return Err(ControlError::InJunction(id));
        }
        self.persons.person_mut(id).set_schedule(entries);
        Ok(())
    }

    /// Move a sleeping person to a new position.
    pub fn reset_person_position(
        &mut self,
        id: PersonId,
        position: PositionSpec,
    ) -> ControlResult<()> {
        let person = self
            .persons
            .person_or_err(id)
            .map_err(|_| ControlError::UnknownPerson(id))?;
        match position {
            PositionSpec::Lane { lane, .. } => {
                self.map
                    .lane_or_err(lane)
                    .map_err(|_| ControlError::UnknownPosition)?;
            }
            PositionSpec::Aoi(aoi) => {
                self.map
                    .aoi_or_err(aoi)
                    .map_err(|_| ControlError::UnknownPosition)?;
            }
        }
        if self.persons.snapshot(id).status != Status::Sleep
            || person.runtime.status != Status::Sleep
        {
            return Err(ControlError::NotSleeping(id));
        }
        self.persons.person_mut(id).set_reset_position(position);
        Ok(())
    }

    /// Run-wide statistics as of the last *prepare*.
    pub fn global_stats(&self) -> GlobalStats {
        self.persons.stats()
    }

    // ── Traffic lights ────────────────────────────────────────────────────

    /// A junction's controller state.
    pub fn traffic_light(&self, junction: JunctionId) -> ControlResult<SignalState> {
        self.map
            .junction_or_err(junction)
            .map_err(|_| ControlError::UnknownJunction(junction))?;
        Ok(self.signals.state(junction))
    }

    /// Install a signal program (empty = all green).
    pub fn set_traffic_light(
        &mut self,
        junction: JunctionId,
        program: LightProgram,
    ) -> ControlResult<()> {
        self.map
            .junction_or_err(junction)
            .map_err(|_| ControlError::UnknownJunction(junction))?;
        self.signals.set_program(junction, program)?;
        Ok(())
    }

    /// Override the current phase and remaining time.
    pub fn set_traffic_light_phase(
        &mut self,
        junction: JunctionId,
        phase: usize,
        remaining: f64,
    ) -> ControlResult<()> {
        self.map
            .junction_or_err(junction)
            .map_err(|_| ControlError::UnknownJunction(junction))?;
        self.signals.set_phase(junction, phase, remaining)?;
        Ok(())
    }

    /// Switch a junction's control on or off (off = all green).
    pub fn set_traffic_light_ok(&mut self, junction: JunctionId, ok: bool) -> ControlResult<()> {
        self.map
            .junction_or_err(junction)
            .map_err(|_| ControlError::UnknownJunction(junction))?;
        self.signals.set_ok(junction, ok)?;
        Ok(())
    }
}
