//! `mts-route` — routing interface and per-agent route state machines.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`types`]      | `Journey`, `WalkSegment`, request/response, positions      |
//! | [`router`]     | `Router` trait (sync + continuation), `LocalRouter`        |
//! | [`vehicle`]    | `VehicleRoute` — roads, junction candidates, LC scan       |
//! | [`pedestrian`] | `PedestrianRoute` — directed walking segments              |
//! | [`multimodal`] | `MultiModalRoute` — wrapper, pre-routes, async waiting     |
//! | [`error`]      | `RouteError`, `RouteResult`                                |
//!
//! The router is an external collaborator: the simulation core only consumes
//! road-id sequences (driving) or `(lane, direction)` segments (walking).
//! [`LocalRouter`] is the in-process default, a Dijkstra over the road graph
//! and the walking-lane adjacency.

pub mod error;
pub mod multimodal;
pub mod pedestrian;
pub mod router;
pub mod types;
pub mod vehicle;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{RouteError, RouteResult};
pub use multimodal::{MultiModalRoute, RouteKind, RoutePoll};
pub use pedestrian::PedestrianRoute;
pub use router::{route_channel, LocalRouter, LocalRouterWithMap, RouteHandle, RouteReply, Router};
pub use types::{
    Journey, MovingDirection, PositionSpec, RouteMode, RoutePosition, RouteRequest,
    RouteResponse, WalkSegment,
};
pub use vehicle::{JunctionCandidate, LcScan, VehicleRoute};
