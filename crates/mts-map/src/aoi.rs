//! The `Aoi` entity: a polygonal area of interest acting as a trip source
//! and sink, with gate positions onto the network and a buffered occupant
//! set.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use mts_core::geom::Point;
use mts_core::{AoiId, LaneId, PersonId};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// AOI *prepare* over the whole arena: drain every occupancy buffer.
pub fn prepare_all(aois: &mut [Aoi]) {
    #[cfg(feature = "parallel")]
    aois.par_iter_mut().for_each(Aoi::prepare);
    #[cfg(not(feature = "parallel"))]
    aois.iter_mut().for_each(Aoi::prepare);
}

/// A polygonal area of interest.
pub struct Aoi {
    pub(crate) id: AoiId,
    pub(crate) centroid: Point,
    pub(crate) boundary: Vec<Point>,
    /// Driving gates: (lane, arc position) pairs.
    pub(crate) driving_gates: Vec<(LaneId, f64)>,
    /// Walking gates: (lane, arc position) pairs.
    pub(crate) walking_gates: Vec<(LaneId, f64)>,
    /// Gate arc position by lane.
    pub(crate) gate_s: HashMap<LaneId, f64>,

    /// Persons currently inside.
    pub(crate) persons: HashSet<PersonId>,
    add_buffer: Mutex<Vec<PersonId>>,
    remove_buffer: Mutex<Vec<PersonId>>,
}

impl Aoi {
    pub(crate) fn new(
        id: AoiId,
        boundary: Vec<Point>,
        driving_gates: Vec<(LaneId, f64)>,
        walking_gates: Vec<(LaneId, f64)>,
    ) -> Self {
        let centroid = mts_core::geom::polygon_centroid(&boundary);
        let gate_s = driving_gates
            .iter()
            .chain(walking_gates.iter())
            .map(|&(lane, s)| (lane, s))
            .collect();
        Self {
            id,
            centroid,
            boundary,
            driving_gates,
            walking_gates,
            gate_s,
            persons: HashSet::new(),
            add_buffer: Mutex::new(Vec::new()),
            remove_buffer: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> AoiId {
        self.id
    }

    #[inline]
    pub fn centroid(&self) -> Point {
        self.centroid
    }

    pub fn boundary(&self) -> &[Point] {
        &self.boundary
    }

    pub fn driving_gates(&self) -> &[(LaneId, f64)] {
        &self.driving_gates
    }

    pub fn walking_gates(&self) -> &[(LaneId, f64)] {
        &self.walking_gates
    }

    pub fn has_driving_gate(&self, lane: LaneId) -> bool {
        self.driving_gates.iter().any(|&(l, _)| l == lane)
    }

    pub fn has_walking_gate(&self, lane: LaneId) -> bool {
        self.walking_gates.iter().any(|&(l, _)| l == lane)
    }

    /// Gate arc position for `lane`.
    ///
    /// # Panics
    /// Panics if `lane` is not a gate of this AOI — gates are fixed at build
    /// time, so a miss is a data invariant violation.
    pub fn gate_s(&self, lane: LaneId) -> f64 {
        *self
            .gate_s
            .get(&lane)
            .unwrap_or_else(|| panic!("no lane {lane} with aoi {}", self.id))
    }

    /// Persons currently inside (as of the last *prepare*).
    pub fn persons(&self) -> &HashSet<PersonId> {
        &self.persons
    }

    pub fn occupant_count(&self) -> usize {
        self.persons.len()
    }

    // ── Buffered occupancy (update phase, `&self`) ────────────────────────

    /// Queue `person` for admission at the next *prepare*.
    pub fn add_person(&self, person: PersonId) {
        let mut buf = self.add_buffer.lock().expect("aoi add buffer poisoned");
        buf.push(person);
    }

    /// Queue `person` for removal at the next *prepare*.
    pub fn remove_person(&self, person: PersonId) {
        let mut buf = self.remove_buffer.lock().expect("aoi remove buffer poisoned");
        buf.push(person);
    }

    // ── Prepare phase (`&mut self`) ───────────────────────────────────────

    /// Drain the occupancy buffers into the occupant set.
    pub fn prepare(&mut self) {
        let removes = std::mem::take(&mut *self.remove_buffer.lock().expect("aoi remove buffer poisoned"));
        for person in removes {
            if !self.persons.remove(&person) {
                tracing::error!("remove person {person} not in aoi {}", self.id);
            }
        }
        let adds = std::mem::take(&mut *self.add_buffer.lock().expect("aoi add buffer poisoned"));
        for person in adds {
            if !self.persons.insert(person) {
                tracing::warn!("add person {person} already in aoi {}", self.id);
            }
        }
    }
}
