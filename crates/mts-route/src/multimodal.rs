//! The multi-modal route wrapper: a drive-only or walk-only journey, plus
//! the asynchronous waiting machinery.

use mts_map::{LaneKind, MapData};

use crate::pedestrian::PedestrianRoute;
use crate::router::{route_channel, RouteHandle, Router};
use crate::types::{Journey, RouteMode, RoutePosition, RouteRequest, RouteResponse};
use crate::vehicle::VehicleRoute;

/// The mode the current route runs in.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RouteKind {
    Walk,
    Drive,
}

/// Result of polling for an in-flight routing request.
#[derive(Debug, PartialEq, Eq)]
pub enum RoutePoll {
    /// Nothing in flight and nothing resolved.
    Idle,
    /// Still waiting on the router.
    Pending,
    /// The request resolved; `ok()` tells whether a route came out of it.
    Resolved,
}

/// A person's current route: one of a vehicle or a pedestrian journey.
pub struct MultiModalRoute {
    pub kind: RouteKind,
    pub vehicle: Option<VehicleRoute>,
    pub pedestrian: Option<PedestrianRoute>,
    ok: bool,
    pending: Option<RouteHandle>,
    start: RoutePosition,
    end: RoutePosition,
}

impl MultiModalRoute {
    pub fn new() -> Self {
        Self {
            kind: RouteKind::Walk,
            vehicle: None,
            pedestrian: None,
            ok: false,
            pending: None,
            start: RoutePosition::default(),
            end: RoutePosition::default(),
        }
    }

    /// `true` when a usable route is loaded.
    #[inline]
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// `true` while a routing request is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any loaded route and any in-flight request.
    pub fn clear(&mut self) {
        self.kind = RouteKind::Walk;
        self.vehicle = None;
        self.pedestrian = None;
        self.ok = false;
        self.pending = None;
    }

    pub fn current_start_position(&self) -> RoutePosition {
        match self.kind {
            RouteKind::Drive => self.vehicle.as_ref().map(|r| r.start),
            RouteKind::Walk => self.pedestrian.as_ref().map(|r| r.start),
        }
        .unwrap_or(self.start)
    }

    pub fn current_end_position(&self) -> RoutePosition {
        match self.kind {
            RouteKind::Drive => self.vehicle.as_ref().map(|r| r.end),
            RouteKind::Walk => self.pedestrian.as_ref().map(|r| r.end),
        }
        .unwrap_or(self.end)
    }

    // ── Producing a route ─────────────────────────────────────────────────

    /// Load a route for the trip.
    ///
    /// A pre-computed journey compatible with `start` is used directly,
    /// without calling the router; otherwise an asynchronous request is
    /// issued and the person waits until [`poll`](Self::poll) resolves it.
    pub fn produce(
        &mut self,
        map: &MapData,
        router: &dyn Router,
        preroutes: &[Journey],
        start: RoutePosition,
        end: RoutePosition,
        mode: RouteMode,
        time: f64,
    ) {
        self.clear();
        self.start = start;
        self.end = end;
        if self.preroute_is_valid(map, preroutes, start) {
            self.process(map, RouteResponse { journeys: preroutes.to_vec() });
            return;
        }
        let (reply, handle) = route_channel();
        self.pending = Some(handle);
        router.route_async(
            RouteRequest { start: start.spec(), end: end.spec(), time, mode },
            reply,
        );
    }

    /// Check for a resolved request, ingesting the response if it arrived.
    pub fn poll(&mut self, map: &MapData) -> RoutePoll {
        let Some(handle) = &self.pending else {
            return RoutePoll::Idle;
        };
        match handle.try_take() {
            None => RoutePoll::Pending,
            Some(Err(e)) => {
                tracing::debug!("routing failed: {e}");
                self.pending = None;
                self.ok = false;
                RoutePoll::Resolved
            }
            Some(Ok(response)) => {
                self.pending = None;
                self.process(map, response);
                RoutePoll::Resolved
            }
        }
    }

    /// A pre-computed journey is valid when its first element starts where
    /// the person actually is.
    fn preroute_is_valid(&self, map: &MapData, preroutes: &[Journey], start: RoutePosition) -> bool {
        let Some(journey) = preroutes.first() else {
            return false;
        };
        match journey {
            Journey::Walking { segments, .. } => {
                let Some(&first) = segments.first() else { return false };
                if let Some(aoi) = start.aoi {
                    if !map.aoi(aoi).has_walking_gate(first.lane) {
                        return false;
                    }
                }
                if let Some(lane) = start.lane {
                    if lane != first.lane {
                        return false;
                    }
                }
                true
            }
            Journey::Driving { roads, .. } => {
                let Some(&first_road) = roads.first() else { return false };
                if let Some(aoi) = start.aoi {
                    let on_road = map
                        .aoi(aoi)
                        .driving_gates()
                        .iter()
                        .any(|&(lane, _)| map.lane(lane).parent_road() == Some(first_road));
                    if !on_road {
                        return false;
                    }
                }
                if let Some(lane) = start.lane {
                    if map.lane(lane).parent_road() != Some(first_road) {
                        return false;
                    }
                }
                true
            }
        }
    }

    /// Ingest a routing response: prune unusable journeys and build the
    /// matching route state machine from the first one.
    fn process(&mut self, map: &MapData, mut response: RouteResponse) {
        response.journeys.retain(|journey| match journey {
            Journey::Walking { segments, .. } => {
                if segments.is_empty() {
                    tracing::warn!("walking journey with empty route, dropped");
                    return false;
                }
                segments.iter().all(|seg| {
                    let ok = map.lane(seg.lane).kind() == LaneKind::Walking;
                    if !ok {
                        tracing::warn!("walking journey crosses non-walking lane {}", seg.lane);
                    }
                    ok
                })
            }
            Journey::Driving { roads, .. } => {
                if roads.is_empty() {
                    tracing::warn!("driving journey with empty roads, dropped");
                    return false;
                }
                true
            }
        });
        let Some(journey) = response.journeys.into_iter().next() else {
            self.ok = false;
            return;
        };
        match journey {
            Journey::Driving { roads, eta } => {
                match VehicleRoute::from_journey(map, roads, eta, self.start, self.end) {
                    Ok(route) => {
                        self.kind = RouteKind::Drive;
                        self.vehicle = Some(route);
                        self.ok = true;
                    }
                    Err(e) => {
                        tracing::warn!("driving journey rejected: {e}");
                        self.ok = false;
                    }
                }
            }
            Journey::Walking { segments, .. } => {
                match PedestrianRoute::from_journey(map, segments, self.start, self.end) {
                    Ok(route) => {
                        self.kind = RouteKind::Walk;
                        self.pedestrian = Some(route);
                        self.ok = true;
                    }
                    Err(e) => {
                        tracing::warn!("walking journey rejected: {e}");
                        self.ok = false;
                    }
                }
            }
        }
    }
}

impl Default for MultiModalRoute {
    fn default() -> Self {
        Self::new()
    }
}
