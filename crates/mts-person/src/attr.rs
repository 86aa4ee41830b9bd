//! Static person attributes.
//!
//! Attributes are validated at construction (bad data is a fatal input
//! error) and then perturbed with per-person noise so a population built
//! from uniform templates still behaves heterogeneously.  All noise draws
//! come from the person's own RNG, in a fixed order.

use mts_core::PersonRng;
use mts_route::PositionSpec;
use mts_schedule::ScheduleEntry;

use crate::error::{PersonError, PersonResult};

// ── Noise bounds ──────────────────────────────────────────────────────────────

/// Largest adjustment applied to the vehicle's max speed (m/s).
const MAX_VEHICLE_V_NOISE: f64 = 5.0;
/// Largest adjustment applied to the vehicle's max braking (m/s²).
const MAX_VEHICLE_A_NOISE: f64 = 0.5;
/// Largest adjustment applied to walking/biking speed (m/s).
const MAX_WALK_V_NOISE: f64 = 0.5;
/// Largest pedestrian lateral display offset (m).
const MAX_PEDESTRIAN_POSITION_NOISE: f64 = 2.0;

const DEFAULT_WALK_V: f64 = 1.34;
const MIN_WALK_V: f64 = 0.5;
const DEFAULT_BIKE_V: f64 = 4.0;
const MIN_BIKE_V: f64 = 1.0;

// ── VehicleAttrs ──────────────────────────────────────────────────────────────

/// Vehicle attributes of a person.
#[derive(Clone, Debug)]
pub struct VehicleAttrs {
    /// Vehicle length (m).
    pub length: f64,
    /// Vehicle width (m).
    pub width: f64,
    /// Desired maximum speed (m/s).
    pub max_speed: f64,
    /// Maximum acceleration (m/s², positive).
    pub max_acc: f64,
    /// Maximum braking acceleration (m/s², negative).
    pub max_braking_acc: f64,
    /// Usual acceleration (m/s², positive).
    pub usual_acc: f64,
    /// Usual braking acceleration (m/s², negative).
    pub usual_braking_acc: f64,
    /// Minimum standstill gap to the leader (m).
    pub min_gap: f64,
    /// Desired time headway (s).
    pub headway: f64,
    /// Expected longitudinal length of a lane change (m).
    pub lane_change_length: f64,
    /// Multiplier on the lane speed limit as this driver perceives it.
    pub lane_max_speed_recognition: f64,
}

impl Default for VehicleAttrs {
    fn default() -> Self {
        Self {
            length: 5.0,
            width: 2.0,
            max_speed: 41.67,
            max_acc: 3.0,
            max_braking_acc: -10.0,
            usual_acc: 2.0,
            usual_braking_acc: -4.5,
            min_gap: 1.0,
            headway: 1.5,
            lane_change_length: 10.0,
            lane_max_speed_recognition: 1.0,
        }
    }
}

impl VehicleAttrs {
    /// Reject physically impossible attribute sets.
    pub fn validate(&self) -> PersonResult<()> {
        let check = |ok: bool, what: &'static str| {
            if ok {
                Ok(())
            } else {
                Err(PersonError::BadAttribute { what })
            }
        };
        check(self.max_speed > 0.0, "vehicle max speed must be positive")?;
        check(self.max_acc > 0.0, "vehicle max acceleration must be positive")?;
        check(self.max_braking_acc < 0.0, "vehicle max braking acceleration must be negative")?;
        check(self.usual_acc > 0.0, "vehicle usual acceleration must be positive")?;
        check(self.usual_braking_acc < 0.0, "vehicle usual braking acceleration must be negative")?;
        check(self.length > 0.0, "vehicle length must be positive")?;
        check(self.width > 0.0, "vehicle width must be positive")?;
        check(self.min_gap >= 0.0, "vehicle min gap must not be negative")?;
        check(self.headway >= 0.0, "vehicle headway must not be negative")?;
        Ok(())
    }

    /// Apply per-person noise: max speed and max braking move by a clipped
    /// Gaussian, floored away from zero.
    pub(crate) fn perturb(&mut self, rng: &mut PersonRng) {
        self.max_speed = (self.max_speed
            + MAX_VEHICLE_V_NOISE * (0.5 * rng.norm()).clamp(-1.0, 1.0))
        .max(0.1);
        self.max_braking_acc = (self.max_braking_acc
            + MAX_VEHICLE_A_NOISE * (0.5 * rng.norm()).clamp(-1.0, 1.0))
        .min(-0.1);
    }
}

// ── PedestrianAttrs ───────────────────────────────────────────────────────────

/// Pedestrian attributes of a person.
#[derive(Clone, Debug)]
pub struct PedestrianAttrs {
    /// Preferred walking speed (m/s).
    pub speed: f64,
    /// Preferred biking speed (m/s).
    pub bike_speed: f64,
}

impl Default for PedestrianAttrs {
    fn default() -> Self {
        Self { speed: DEFAULT_WALK_V, bike_speed: DEFAULT_BIKE_V }
    }
}

impl PedestrianAttrs {
    /// Noised walking and biking speeds plus display offsets, drawn in a
    /// fixed order.
    pub(crate) fn perturbed(&self, rng: &mut PersonRng) -> (f64, f64, f64, f64) {
        let walk_v = (self.speed + MAX_WALK_V_NOISE * (0.5 * rng.norm()).clamp(-1.0, 1.0))
            .max(MIN_WALK_V);
        let bike_v = (self.bike_speed + MAX_WALK_V_NOISE * (0.5 * rng.norm()).clamp(-1.0, 1.0))
            .max(MIN_BIKE_V);
        let vertical_offset_rate = rng.uniform();
        let horizontal_offset = rng
            .norm()
            .clamp(-MAX_PEDESTRIAN_POSITION_NOISE, MAX_PEDESTRIAN_POSITION_NOISE);
        (walk_v, bike_v, vertical_offset_rate, horizontal_offset)
    }
}

// ── PersonSpec ────────────────────────────────────────────────────────────────

/// Input description of one person.
#[derive(Clone, Debug)]
pub struct PersonSpec {
    pub vehicle: VehicleAttrs,
    pub pedestrian: PedestrianAttrs,
    /// Initial position (AOI or lane).
    pub home: PositionSpec,
    pub schedule: Vec<ScheduleEntry>,
}
