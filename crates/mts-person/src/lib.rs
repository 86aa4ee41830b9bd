//! `mts-person` — the mobile agents: drivers and pedestrians.
//!
//! # Crate layout
//!
//! | Module          | Contents                                               |
//! |-----------------|--------------------------------------------------------|
//! | [`attr`]        | Static person attributes and construction noise        |
//! | [`runtime`]     | `Runtime` double buffer, `Action`, lane-change state   |
//! | [`controller`]  | Perception and the longitudinal decision (IDM, lights) |
//! | [`lane_change`] | Lateral decision: forced and discretionary (MOBIL)     |
//! | [`motion`]      | Integration, lane-change execution, node bookkeeping   |
//! | [`pedestrian`]  | Walking along directed segments                        |
//! | [`person`]      | The lifecycle state machine                            |
//! | [`manager`]     | `PersonManager`: arena, snapshots, phase drivers       |
//!
//! # Concurrency contract
//!
//! During *update* every person is advanced in parallel.  A person mutates
//! only its own `runtime` and writes to other entities exclusively through
//! their buffered interfaces (lane queues, AOI occupancy).  All cross-agent
//! reads go through the `snapshots` slice — last step's committed state —
//! so results do not depend on scheduling order.

pub mod attr;
pub mod controller;
pub mod error;
pub mod lane_change;
pub mod manager;
pub mod motion;
pub mod pedestrian;
pub mod person;
pub mod runtime;

#[cfg(test)]
mod tests;

pub use attr::{PedestrianAttrs, PersonSpec, VehicleAttrs};
pub use error::{PersonError, PersonResult};
pub use manager::{GlobalStats, PersonManager, WorldCtx};
pub use person::Person;
pub use runtime::{Action, LcState, Runtime, Status};
