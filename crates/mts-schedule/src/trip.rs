//! Trip and schedule-entry data.

use mts_route::{Journey, PositionSpec};

/// How a trip is carried out.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TripMode {
    DriveOnly,
    WalkOnly,
    BikeWalk,
}

impl TripMode {
    /// `true` for trips carried out behind the wheel.
    #[inline]
    pub fn is_driving(self) -> bool {
        matches!(self, TripMode::DriveOnly)
    }

    /// `true` for trips carried out on foot (or foot + bike).
    #[inline]
    pub fn is_walking(self) -> bool {
        matches!(self, TripMode::WalkOnly | TripMode::BikeWalk)
    }
}

/// One trip of a schedule entry.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trip {
    pub mode: TripMode,
    /// Where the trip ends.
    pub end: PositionSpec,
    /// Absolute departure time (s); overrides `wait_time`.
    pub departure_time: Option<f64>,
    /// Wait after the previous trip's end (s).
    pub wait_time: Option<f64>,
    /// Pre-computed journeys; used without calling the router when they
    /// start where the person is.
    pub routes: Vec<Journey>,
}

impl Trip {
    pub fn new(mode: TripMode, end: PositionSpec) -> Self {
        Self {
            mode,
            end,
            departure_time: None,
            wait_time: None,
            routes: Vec::new(),
        }
    }

    pub fn departing_at(mut self, time: f64) -> Self {
        self.departure_time = Some(time);
        self
    }

    pub fn waiting(mut self, time: f64) -> Self {
        self.wait_time = Some(time);
        self
    }

    pub fn with_routes(mut self, routes: Vec<Journey>) -> Self {
        self.routes = routes;
        self
    }
}

/// An entry of the schedule: a list of trips repeated `loop_count` times
/// (0 = forever).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleEntry {
    pub trips: Vec<Trip>,
    pub loop_count: u32,
    /// Absolute departure time for the entry's first trip (s).
    pub departure_time: Option<f64>,
    /// Wait before the entry's first trip (s).
    pub wait_time: Option<f64>,
}

impl ScheduleEntry {
    pub fn once(trips: Vec<Trip>) -> Self {
        Self {
            trips,
            loop_count: 1,
            departure_time: None,
            wait_time: None,
        }
    }
}
