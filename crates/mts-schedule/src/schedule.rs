//! The per-person schedule cursor.

use mts_map::{LaneKind, MapData};
use mts_route::PositionSpec;

use crate::error::{ScheduleError, ScheduleResult};
use crate::trip::{ScheduleEntry, Trip};

/// Walks a person's schedule entries and trips, tracking loops and deriving
/// departure times.
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
    pub schedule_index: usize,
    pub trip_index: usize,
    loop_count: u32,
    last_trip_end_time: f64,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            schedule_index: 0,
            trip_index: 0,
            loop_count: 0,
            last_trip_end_time: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The trip the cursor points at, if any.
    pub fn trip(&self) -> Option<&Trip> {
        self.entries
            .get(self.schedule_index)?
            .trips
            .get(self.trip_index)
    }

    /// Install a new schedule, dropping trips whose end position cannot
    /// serve their mode (with a warning).  Entries left without trips are
    /// dropped entirely.
    pub fn set(&mut self, map: &MapData, entries: Vec<ScheduleEntry>, time: f64) {
        let mut accepted = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.trips.retain(|trip| match validate_trip(map, trip) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("invalid trip ({e}), skip it");
                    false
                }
            });
            if !entry.trips.is_empty() {
                accepted.push(entry);
            }
        }
        self.entries = accepted;
        self.schedule_index = 0;
        self.trip_index = 0;
        self.loop_count = 0;
        if self.entries.is_empty() {
            self.last_trip_end_time = time;
            return;
        }
        let first = &self.entries[0];
        if let Some(departure) = first.departure_time {
            self.last_trip_end_time = departure;
        } else if let Some(wait) = first.wait_time {
            self.last_trip_end_time = time + wait;
        } else {
            self.last_trip_end_time = time;
        }
    }

    /// Advance to the next trip.  Returns `false` when the whole schedule is
    /// exhausted (the entries are cleared).
    pub fn next_trip(&mut self, time: f64) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.last_trip_end_time = time;
        let entry_trip_count = self.entries[self.schedule_index].trips.len();
        self.trip_index += 1;
        if self.trip_index == entry_trip_count {
            self.trip_index = 0;
            self.loop_count += 1;
            let entry_loops = self.entries[self.schedule_index].loop_count;
            if entry_loops > 0 && self.loop_count >= entry_loops {
                self.loop_count = 0;
                self.schedule_index += 1;
                if self.schedule_index == self.entries.len() {
                    self.entries.clear();
                    self.schedule_index = 0;
                    return false;
                }
                let entry = &self.entries[self.schedule_index];
                if let Some(wait) = entry.wait_time {
                    self.last_trip_end_time += wait;
                } else if let Some(departure) = entry.departure_time {
                    self.last_trip_end_time = departure;
                }
            }
        }
        true
    }

    /// The departure time of the current trip; ∞ when there is none.
    pub fn departure_time(&self) -> f64 {
        let Some(trip) = self.trip() else {
            return f64::INFINITY;
        };
        if let Some(departure) = trip.departure_time {
            if self.loop_count != 0 {
                tracing::warn!("departure time used in loop");
            }
            return departure;
        }
        match trip.wait_time {
            Some(wait) => self.last_trip_end_time + wait,
            None => self.last_trip_end_time,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

/// A trip's end must be reachable in its mode: driving needs a driving gate
/// or lane, walking needs a walking gate or lane.
fn validate_trip(map: &MapData, trip: &Trip) -> ScheduleResult<()> {
    match trip.end {
        PositionSpec::Aoi(aoi) => {
            let aoi_data = map
                .aoi_or_err(aoi)
                .map_err(|_| ScheduleError::UnknownAoi(aoi))?;
            if trip.mode.is_driving() {
                if aoi_data.driving_gates().is_empty() {
                    return Err(ScheduleError::NoDrivingGates(aoi));
                }
            } else if aoi_data.walking_gates().is_empty() {
                return Err(ScheduleError::NoWalkingGates(aoi));
            }
        }
        PositionSpec::Lane { lane, .. } => {
            let lane_data = map
                .lane_or_err(lane)
                .map_err(|_| ScheduleError::UnknownLane(lane))?;
            if trip.mode.is_driving() {
                if lane_data.kind() != LaneKind::Driving {
                    return Err(ScheduleError::NotDrivingLane(lane));
                }
            } else if lane_data.kind() != LaneKind::Walking {
                return Err(ScheduleError::NotWalkingLane(lane));
            }
        }
    }
    Ok(())
}
