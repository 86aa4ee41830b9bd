//! Observer hooks for the tick loop.
//!
//! All methods have no-op defaults.  `on_prepare_complete` is where an
//! external step synchronizer is notified that the step's state is committed
//! and may be read out while *update* runs.

/// Callbacks invoked by [`Simulation::run`][crate::Simulation::run] at key
/// points of the tick loop.
pub trait SimObserver {
    /// Called before a tick's *prepare* phase.
    fn on_tick_start(&mut self, _step: u32) {}

    /// Called between *prepare* and *update* — the cross-step barrier point.
    fn on_prepare_complete(&mut self, _step: u32) {}

    /// Called after the tick's *update* phase.
    fn on_tick_end(&mut self, _step: u32) {}

    /// Called once when the run finishes.
    fn on_sim_end(&mut self, _final_step: u32) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
