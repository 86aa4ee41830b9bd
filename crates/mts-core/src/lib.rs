//! `mts-core` — foundational types for the `rust_mts` traffic simulator.
//!
//! This crate is a dependency of every other `mts-*` crate.  It intentionally
//! has no `mts-*` dependencies and minimal external ones (`rand`,
//! `rand_distr`, `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module     | Contents                                                  |
//! |------------|-----------------------------------------------------------|
//! | [`ids`]    | `LaneId`, `RoadId`, `JunctionId`, `AoiId`, `PersonId`     |
//! | [`clock`]  | `SimClock`, `StepConfig`                                  |
//! | [`config`] | `SimConfig`, `SimFlags`, `InputSource`                    |
//! | [`geom`]   | `Point`, polyline arithmetic, projection, centroids       |
//! | [`light`]  | `LightState`, `Side`, `LinkDir`                           |
//! | [`rng`]    | `PersonRng` (per-person deterministic RNG)                |
//! | [`error`]  | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types. |

pub mod clock;
pub mod config;
pub mod error;
pub mod geom;
pub mod ids;
pub mod light;
pub mod rng;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use clock::{SimClock, StepConfig};
pub use config::{InputSource, SimConfig, SimFlags};
pub use error::{CoreError, CoreResult};
pub use geom::Point;
pub use ids::{AoiId, JunctionId, LaneId, PersonId, RoadId};
pub use light::{LightState, LinkDir, Side};
pub use rng::PersonRng;
