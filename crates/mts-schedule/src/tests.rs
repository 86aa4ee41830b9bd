//! Unit tests for mts-schedule.

use mts_core::geom::Point;
use mts_core::LaneId;
use mts_map::{AoiSpec, LaneKind, LaneSpec, LaneTurn, MapBuilder, MapData, RoadSpec};
use mts_route::PositionSpec;

use crate::schedule::Schedule;
use crate::trip::{ScheduleEntry, Trip, TripMode};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn tiny_map() -> (MapData, LaneId, LaneId) {
    let mut b = MapBuilder::new();
    let driving = b.add_lane(LaneSpec {
        kind: LaneKind::Driving,
        turn: LaneTurn::Straight,
        max_speed: 16.67,
        width: 3.2,
        line: vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
    });
    let walking = b.add_lane(LaneSpec {
        kind: LaneKind::Walking,
        turn: LaneTurn::Straight,
        max_speed: 1.5,
        width: 2.0,
        line: vec![Point::new(0.0, 5.0), Point::new(100.0, 5.0)],
    });
    b.add_road(RoadSpec { name: String::new(), lanes: vec![driving, walking] });
    b.add_aoi(AoiSpec {
        boundary: vec![Point::new(0.0, 10.0), Point::new(5.0, 10.0), Point::new(5.0, 15.0)],
        walking_gates: vec![(walking, 20.0)],
        ..Default::default()
    });
    (b.build().unwrap(), driving, walking)
}

fn drive_trip(lane: LaneId) -> Trip {
    Trip::new(TripMode::DriveOnly, PositionSpec::Lane { lane, s: 50.0 })
}

// ── Cursor ────────────────────────────────────────────────────────────────────

#[test]
fn trips_advance_in_order() {
    let (map, driving, _) = tiny_map();
    let mut schedule = Schedule::new();
    schedule.set(
        &map,
        vec![ScheduleEntry::once(vec![
            drive_trip(driving).departing_at(10.0),
            drive_trip(driving).waiting(5.0),
        ])],
        0.0,
    );
    assert!((schedule.departure_time() - 10.0).abs() < 1e-9);
    assert!(schedule.next_trip(100.0));
    // Second trip waits 5 s after the first ended at t = 100.
    assert!((schedule.departure_time() - 105.0).abs() < 1e-9);
    assert!(!schedule.next_trip(200.0));
    assert!(schedule.is_empty());
    assert!(schedule.departure_time().is_infinite());
}

#[test]
fn entry_loops_repeat_trips() {
    let (map, driving, _) = tiny_map();
    let mut schedule = Schedule::new();
    schedule.set(
        &map,
        vec![ScheduleEntry {
            trips: vec![drive_trip(driving)],
            loop_count: 3,
            departure_time: None,
            wait_time: None,
        }],
        0.0,
    );
    assert!(schedule.next_trip(10.0));
    assert!(schedule.next_trip(20.0));
    assert!(!schedule.next_trip(30.0));
}

#[test]
fn second_entry_wait_time_applies() {
    let (map, driving, _) = tiny_map();
    let mut schedule = Schedule::new();
    schedule.set(
        &map,
        vec![
            ScheduleEntry::once(vec![drive_trip(driving)]),
            ScheduleEntry {
                trips: vec![drive_trip(driving)],
                loop_count: 1,
                departure_time: None,
                wait_time: Some(30.0),
            },
        ],
        0.0,
    );
    assert!(schedule.next_trip(50.0));
    assert!((schedule.departure_time() - 80.0).abs() < 1e-9);
}

// ── Validation ────────────────────────────────────────────────────────────────

#[test]
fn wrong_lane_kind_drops_the_trip() {
    let (map, driving, walking) = tiny_map();
    let mut schedule = Schedule::new();
    schedule.set(
        &map,
        vec![ScheduleEntry::once(vec![
            // Driving trip ending on a walking lane: dropped.
            Trip::new(TripMode::DriveOnly, PositionSpec::Lane { lane: walking, s: 10.0 }),
            drive_trip(driving),
        ])],
        0.0,
    );
    assert_eq!(schedule.trip().unwrap().end, PositionSpec::Lane { lane: driving, s: 50.0 });
    assert!(!schedule.next_trip(10.0));
}

#[test]
fn aoi_without_driving_gates_rejects_drive_trip() {
    let (map, _, walking) = tiny_map();
    let aoi = map.aois[0].id();
    let mut schedule = Schedule::new();
    schedule.set(
        &map,
        vec![ScheduleEntry::once(vec![
            Trip::new(TripMode::DriveOnly, PositionSpec::Aoi(aoi)),
            Trip::new(TripMode::WalkOnly, PositionSpec::Lane { lane: walking, s: 10.0 }),
        ])],
        0.0,
    );
    // Only the walking trip survives.
    assert_eq!(schedule.trip().unwrap().mode, TripMode::WalkOnly);
    assert!(!schedule.next_trip(10.0));
}

#[test]
fn all_trips_invalid_leaves_schedule_empty() {
    let (map, _, walking) = tiny_map();
    let mut schedule = Schedule::new();
    schedule.set(
        &map,
        vec![ScheduleEntry::once(vec![Trip::new(
            TripMode::DriveOnly,
            PositionSpec::Lane { lane: walking, s: 10.0 },
        )])],
        7.0,
    );
    assert!(schedule.is_empty());
    assert!(schedule.trip().is_none());
}
