//! `mts-sim` — the simulation: map + signals + persons advanced by a
//! two-phase parallel tick.
//!
//! # The tick
//!
//! Each step runs two phases with a global barrier between them:
//!
//! 1. **prepare** — the clock advances; persons refresh their lane-node keys
//!    (sequential); then, forked in parallel, AOIs drain their occupancy
//!    buffers while persons commit snapshots and lanes resolve their queues;
//!    finally the junction controllers write every junction lane's light.
//! 2. **update** — persons decide and move (parallel, reading snapshots and
//!    writing only buffered interfaces) while the signal controllers advance
//!    their countdowns against the read-only lane state.
//!
//! [`SimObserver`] hooks fire at tick start, after *prepare* (where an
//! external step synchronizer would be notified), and at tick end.

pub mod builder;
pub mod control;
pub mod error;
pub mod observer;
pub mod sim;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use control::{ControlError, ControlResult, PersonFilter};
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver};
pub use sim::Simulation;
