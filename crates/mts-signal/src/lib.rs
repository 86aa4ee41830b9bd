//! `mts-signal` — per-junction traffic-light control.
//!
//! Two controllers are provided:
//!
//! - [`FixedController`] cycles a fixed program of phases.  On install it
//!   pre-computes, per lane and phase, the time until the lane's next actual
//!   state change, so a vehicle planning through a green that turns into
//!   another green sees the combined remaining time.
//! - [`MaxPressureController`] re-selects the highest-pressure phase each
//!   time the current one expires, extends an unchanged phase up to a repeat
//!   cap, and schedules pedestrian-clear / yellow / all-red transitions
//!   between differing phases.
//!
//! # Write-once contract
//!
//! Each lane's light is written exactly once per step, during *prepare*, by
//! its junction's controller.  Junctions without a controller leave their
//! lanes at the initial all-green, as do controllers that are switched off.
//! Road lanes are never written and stay green.

pub mod error;
pub mod fixed;
pub mod manager;
pub mod max_pressure;

#[cfg(test)]
mod tests;

pub use error::{SignalError, SignalResult};
pub use fixed::FixedController;
pub use manager::{Controller, SignalManager, SignalState};
pub use max_pressure::MaxPressureController;
