//! `mts-map` — the static road network and its per-lane agent queues.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                       |
//! |--------------|----------------------------------------------------------------|
//! | [`queue`]    | `LaneQueue` — ordered agent sequence with buffered add/remove  |
//! | [`lane`]     | `Lane` — geometry, connections, light target, queues           |
//! | [`road`]     | `Road` — ordered lanes between two junctions                   |
//! | [`junction`] | `Junction` — driving-lane groups, phases, fixed program        |
//! | [`aoi`]      | `Aoi` — gates and buffered occupancy                           |
//! | [`builder`]  | `MapBuilder` → validated [`MapData`]                           |
//! | [`error`]    | `MapError`, `MapResult`                                        |
//!
//! # Ownership model
//!
//! All entities live in arena `Vec`s inside [`MapData`]; everything else
//! holds typed ids into those arenas.  The queues inside each lane are the
//! only mutable state: they take buffered writes through a short-held mutex
//! during *update* and resolve them during *prepare* (see [`queue`]).

pub mod aoi;
pub mod builder;
pub mod error;
pub mod junction;
pub mod lane;
pub mod queue;
pub mod road;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use aoi::Aoi;
pub use builder::{AoiSpec, GroupSpec, JunctionSpec, LaneSpec, MapBuilder, MapData, RoadSpec};
pub use error::{MapError, MapResult};
pub use junction::{Junction, LaneGroup, LightProgram, ProgramPhase};
pub use lane::{Connection, Lane, LaneKind, LaneParent, LaneTurn, Overlap};
pub use queue::{LaneQueue, Node, NodeRef, SideLinks};
