//! The person arena and its phase drivers.

use std::sync::Mutex;

use mts_core::{PersonId, SimFlags};
use mts_map::MapData;
use mts_route::Router;

use crate::attr::PersonSpec;
use crate::error::{PersonError, PersonResult};
use crate::person::Person;
use crate::runtime::{Runtime, Status};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ── WorldCtx ──────────────────────────────────────────────────────────────────

/// Read-only world view handed to every person during *update*.
///
/// Cross-agent state comes exclusively from `snapshots` (last step's
/// committed values); the map is immutable apart from its buffered write
/// interfaces.
pub struct WorldCtx<'a> {
    pub map: &'a MapData,
    pub snapshots: &'a [Runtime],
    /// Static vehicle length per person (m).
    pub lengths: &'a [f64],
    /// Current simulated time (s).
    pub t: f64,
    /// Step length (s).
    pub dt: f64,
    /// Whether this is the run's final step (force-end).
    pub last_step: bool,
}

impl WorldCtx<'_> {
    /// The length another agent occupies on a lane: its vehicle length while
    /// driving, nothing otherwise.
    #[inline]
    pub fn effective_length(&self, person: PersonId) -> f64 {
        if self.snapshots[person.index()].status == Status::Driving {
            self.lengths[person.index()]
        } else {
            0.0
        }
    }
}

// ── Global statistics ─────────────────────────────────────────────────────────

/// Run-wide counters exposed through the control surface.
#[derive(Copy, Clone, Debug, Default)]
pub struct GlobalStats {
    pub completed_trips: u64,
    /// Accumulated on-road time over all agents (s).
    pub travel_time: f64,
    /// Accumulated on-road distance over all agents (m).
    pub travel_distance: f64,
}

/// Mutex-guarded statistics cell shared by the parallel person update.
#[derive(Default)]
pub struct StatsCell(Mutex<GlobalStats>);

impl StatsCell {
    pub(crate) fn record_running(&self, dt: f64, ds: f64) {
        let mut stats = self.0.lock().expect("stats poisoned");
        stats.travel_time += dt;
        stats.travel_distance += ds;
    }

    pub(crate) fn record_trip_end(&self) {
        self.0.lock().expect("stats poisoned").completed_trips += 1;
    }

    fn get(&self) -> GlobalStats {
        *self.0.lock().expect("stats poisoned")
    }
}

// ── PersonManager ─────────────────────────────────────────────────────────────

/// Owns every person, their snapshots, and the global statistics.
pub struct PersonManager {
    persons: Vec<Person>,
    snapshots: Vec<Runtime>,
    /// Static vehicle length per person, for neighbors' gap arithmetic.
    lengths: Vec<f64>,
    stats: StatsCell,
    stats_snapshot: GlobalStats,
}

impl PersonManager {
    pub fn new() -> Self {
        Self {
            persons: Vec::new(),
            snapshots: Vec::new(),
            lengths: Vec::new(),
            stats: StatsCell::default(),
            stats_snapshot: GlobalStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    /// Admit a person with the next id.  Attribute validation failures are
    /// input errors and reported to the caller.
    pub fn add_person(
        &mut self,
        map: &MapData,
        spec: PersonSpec,
        flags: &SimFlags,
        time: f64,
    ) -> PersonResult<PersonId> {
        let id = PersonId(self.persons.len() as u32);
        let person = Person::new(id, spec, map, flags.seed_offset, time)?;
        self.lengths.push(person.vehicle_attrs().length);
        self.snapshots.push(person.runtime);
        self.persons.push(person);
        Ok(id)
    }

    #[inline]
    pub fn person(&self, id: PersonId) -> &Person {
        &self.persons[id.index()]
    }

    #[inline]
    pub fn person_mut(&mut self, id: PersonId) -> &mut Person {
        &mut self.persons[id.index()]
    }

    pub fn person_or_err(&self, id: PersonId) -> PersonResult<&Person> {
        self.persons.get(id.index()).ok_or(PersonError::Unknown(id))
    }

    pub fn person_mut_or_err(&mut self, id: PersonId) -> PersonResult<&mut Person> {
        self.persons
            .get_mut(id.index())
            .ok_or(PersonError::Unknown(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.persons.iter()
    }

    /// Last step's committed state of every person.
    pub fn snapshots(&self) -> &[Runtime] {
        &self.snapshots
    }

    pub fn snapshot(&self, id: PersonId) -> &Runtime {
        &self.snapshots[id.index()]
    }

    /// Global statistics as of the last *prepare*.
    pub fn stats(&self) -> GlobalStats {
        self.stats_snapshot
    }

    // ── Phase drivers ─────────────────────────────────────────────────────

    /// Node-refresh pass.  Sequential: node keys are rewritten in the lane
    /// arenas, and pending schedule replacements may cancel queued nodes.
    pub fn prepare_node(&mut self, map: &mut MapData, time: f64) {
        for (person, snapshot) in self.persons.iter_mut().zip(&self.snapshots) {
            person.prepare_node(map, snapshot, time);
        }
    }

    /// Snapshot swap: commit every runtime, reset drivers' action buffers,
    /// and snapshot the statistics.
    pub fn prepare(&mut self) {
        #[cfg(feature = "parallel")]
        self.persons
            .par_iter_mut()
            .zip(self.snapshots.par_iter_mut())
            .for_each(|(person, snapshot)| {
                *snapshot = person.runtime;
                person.prepare();
            });
        #[cfg(not(feature = "parallel"))]
        self.persons
            .iter_mut()
            .zip(self.snapshots.iter_mut())
            .for_each(|(person, snapshot)| {
                *snapshot = person.runtime;
                person.prepare();
            });
        self.stats_snapshot = self.stats.get();
    }

    /// Parallel person update.
    pub fn update(
        &mut self,
        map: &MapData,
        router: &dyn Router,
        t: f64,
        dt: f64,
        last_step: bool,
    ) {
        let ctx = WorldCtx {
            map,
            snapshots: &self.snapshots,
            lengths: &self.lengths,
            t,
            dt,
            last_step,
        };
        let stats = &self.stats;
        #[cfg(feature = "parallel")]
        self.persons
            .par_iter_mut()
            .for_each(|person| person.update(&ctx, router, stats));
        #[cfg(not(feature = "parallel"))]
        self.persons
            .iter_mut()
            .for_each(|person| person.update(&ctx, router, stats));
    }
}

impl Default for PersonManager {
    fn default() -> Self {
        Self::new()
    }
}
