//! Fluent builder for constructing a [`Simulation`].

use mts_core::SimConfig;
use mts_map::MapData;
use mts_person::{PersonManager, PersonSpec};
use mts_route::{LocalRouter, Router};
use mts_signal::SignalManager;

use crate::error::SimResult;
use crate::sim::{SimRouter, Simulation};

/// Builder for [`Simulation`].
///
/// # Required inputs
///
/// - [`SimConfig`] — step range, signal flags, fixed-light preference
/// - [`MapData`] — from [`mts_map::MapBuilder`]
///
/// # Optional inputs
///
/// | Method          | Default                                       |
/// |-----------------|-----------------------------------------------|
/// | `.person(spec)` | No persons                                    |
/// | `.router(r)`    | [`LocalRouter`] over the simulation's map     |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, map)
///     .person(commuter_spec)
///     .build()?;
/// sim.run(&mut NoopObserver);
/// ```
pub struct SimBuilder {
    config: SimConfig,
    map: MapData,
    persons: Vec<PersonSpec>,
    router: Option<Box<dyn Router>>,
}

impl SimBuilder {
    pub fn new(config: SimConfig, map: MapData) -> Self {
        Self {
            config,
            map,
            persons: Vec::new(),
            router: None,
        }
    }

    /// Add one person.
    pub fn person(mut self, spec: PersonSpec) -> Self {
        self.persons.push(spec);
        self
    }

    /// Add a batch of persons.
    pub fn persons(mut self, specs: impl IntoIterator<Item = PersonSpec>) -> Self {
        self.persons.extend(specs);
        self
    }

    /// Replace the in-process router.
    pub fn router(mut self, router: Box<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// Validate the inputs and assemble the simulation.
    pub fn build(self) -> SimResult<Simulation> {
        let signals = SignalManager::new(&self.map, &self.config);
        let mut persons = PersonManager::new();
        let start_time = self.config.step.start as f64 * self.config.step.interval;
        for spec in self.persons {
            persons.add_person(&self.map, spec, &self.config.flags, start_time)?;
        }
        let router = match self.router {
            Some(router) => SimRouter::External(router),
            None => SimRouter::Local(LocalRouter::new(&self.map)),
        };
        Ok(Simulation::new(self.config, self.map, signals, persons, router))
    }
}
