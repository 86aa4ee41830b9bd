//! `mts-schedule` — trips, schedules, and the per-person schedule cursor.
//!
//! A person carries an ordered list of [`ScheduleEntry`]s; each entry holds a
//! loop count and a list of [`Trip`]s.  The [`Schedule`] cursor walks trips,
//! loops entries, and derives departure times from explicit departure times
//! or wait times relative to the previous trip's end.
//!
//! Trips are validated against the map when a schedule is installed; a trip
//! whose end position cannot serve its mode is dropped with a warning and
//! the remaining trips proceed.

pub mod error;
pub mod schedule;
pub mod trip;

#[cfg(test)]
mod tests;

pub use error::{ScheduleError, ScheduleResult};
pub use schedule::Schedule;
pub use trip::{ScheduleEntry, Trip, TripMode};
