//! The `Simulation` struct and its two-phase tick loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mts_core::{SimClock, SimConfig};
use mts_map::MapData;
use mts_person::PersonManager;
use mts_route::{LocalRouter, LocalRouterWithMap, Router};
use mts_signal::SignalManager;

use crate::observer::SimObserver;

/// How routing requests are answered.
pub(crate) enum SimRouter {
    /// In-process Dijkstra over the simulation's own map.
    Local(LocalRouter),
    /// A user-supplied router (e.g. a networked service).
    External(Box<dyn Router>),
}

/// The assembled simulation.  Create via [`SimBuilder`][crate::SimBuilder].
pub struct Simulation {
    pub config: SimConfig,
    pub clock: SimClock,
    pub map: MapData,
    pub signals: SignalManager,
    pub persons: PersonManager,
    pub(crate) router: SimRouter,
    stop: Arc<AtomicBool>,
}

impl Simulation {
    pub(crate) fn new(
        config: SimConfig,
        map: MapData,
        signals: SignalManager,
        persons: PersonManager,
        router: SimRouter,
    ) -> Self {
        let clock = SimClock::new(&config.step);
        Self {
            config,
            clock,
            map,
            signals,
            persons,
            router,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that stops [`run`](Self::run) at the next tick boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run ticks until the configured end step or an external stop.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) {
        loop {
            observer.on_tick_start(self.clock.step);
            self.prepare();
            observer.on_prepare_complete(self.clock.step);
            self.update();
            observer.on_tick_end(self.clock.step);
            if self.clock.step + 1 >= self.clock.end_step || self.stop.load(Ordering::Relaxed) {
                break;
            }
        }
        tracing::info!("engine complete");
        observer.on_sim_end(self.clock.step);
    }

    /// Run exactly `n` ticks (test and incremental stepping helper).
    pub fn run_ticks(&mut self, n: u32) {
        for _ in 0..n {
            self.prepare();
            self.update();
        }
    }

    // ── Phase 1: prepare ──────────────────────────────────────────────────

    /// Advance the clock and commit the step's state: node keys, snapshots,
    /// lane queues, occupancy, and lane lights.
    fn prepare(&mut self) {
        self.clock.advance();
        if self.clock.step % self.config.flags.heartbeat_interval.max(1) == 0 {
            let (h, m, s) = self.clock.hms();
            tracing::info!("STEP: {}({}:{}:{:.2})", self.clock.step, h, m, s);
        }

        // Node-key refresh runs alone: it rewrites lane-queue keys the queue
        // maintenance below depends on.
        self.persons.prepare_node(&mut self.map, self.clock.t);

        let MapData { lanes, aois, .. } = &mut self.map;
        let persons = &mut self.persons;
        let signals = &mut self.signals;

        let person_lane_junction = || {
            #[cfg(feature = "parallel")]
            rayon::join(|| persons.prepare(), || mts_map::lane::prepare_all(lanes));
            #[cfg(not(feature = "parallel"))]
            {
                persons.prepare();
                mts_map::lane::prepare_all(lanes);
            }
            // Lights are written only after the lane queues are final.
            signals.prepare(lanes);
        };

        #[cfg(feature = "parallel")]
        rayon::join(person_lane_junction, || mts_map::aoi::prepare_all(aois));
        #[cfg(not(feature = "parallel"))]
        {
            person_lane_junction();
            mts_map::aoi::prepare_all(aois);
        }
    }

    // ── Phase 2: update ───────────────────────────────────────────────────

    /// Advance all agents and signal controllers against the committed
    /// state.
    fn update(&mut self) {
        let bound;
        let router: &dyn Router = match &self.router {
            SimRouter::External(router) => router.as_ref(),
            SimRouter::Local(local) => {
                bound = LocalRouterWithMap { router: local, map: &self.map };
                &bound
            }
        };
        let map = &self.map;
        let persons = &mut self.persons;
        let signals = &mut self.signals;
        let (t, dt) = (self.clock.t, self.clock.dt);
        let last_step = self.clock.is_last_step();

        #[cfg(feature = "parallel")]
        rayon::join(
            || persons.update(map, router, t, dt, last_step),
            || signals.update(dt, &map.lanes),
        );
        #[cfg(not(feature = "parallel"))]
        {
            persons.update(map, router, t, dt, last_step);
            signals.update(dt, &map.lanes);
        }
    }
}
