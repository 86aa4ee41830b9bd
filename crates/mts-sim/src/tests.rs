//! End-to-end scenarios over the assembled simulation.

use mts_core::geom::Point;
use mts_core::{LaneId, LightState, PersonId, SimConfig, StepConfig};
use mts_map::{
    AoiSpec, GroupSpec, JunctionSpec, LaneKind, LaneSpec, LaneTurn, LightProgram, MapBuilder,
    MapData, ProgramPhase, RoadSpec,
};
use mts_person::{PedestrianAttrs, PersonSpec, Status, VehicleAttrs};
use mts_route::PositionSpec;
use mts_schedule::{ScheduleEntry, Trip, TripMode};

use crate::builder::SimBuilder;
use crate::control::PersonFilter;
use crate::observer::NoopObserver;
use crate::sim::Simulation;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn drive_lane(len: f64, max_speed: f64) -> LaneSpec {
    LaneSpec {
        kind: LaneKind::Driving,
        turn: LaneTurn::Straight,
        max_speed,
        width: 3.2,
        line: vec![Point::new(0.0, 0.0), Point::new(len, 0.0)],
    }
}

fn walk_lane(len: f64) -> LaneSpec {
    LaneSpec {
        kind: LaneKind::Walking,
        turn: LaneTurn::Straight,
        max_speed: 1.5,
        width: 2.0,
        line: vec![Point::new(0.0, -6.0), Point::new(len, -6.0)],
    }
}

fn config(total: u32) -> SimConfig {
    SimConfig {
        step: StepConfig { start: 0, total, interval: 1.0 },
        prefer_fixed_light: true,
        ..Default::default()
    }
}

fn driver_attrs() -> VehicleAttrs {
    VehicleAttrs {
        length: 5.0,
        width: 2.0,
        max_speed: 40.0, // lane limits govern; attribute noise stays irrelevant
        max_acc: 2.0,
        max_braking_acc: -6.0,
        usual_acc: 2.0,
        usual_braking_acc: -3.0,
        min_gap: 2.0,
        headway: 1.5,
        lane_change_length: 10.0,
        lane_max_speed_recognition: 1.0,
    }
}

fn drive_spec(home: PositionSpec, end: PositionSpec) -> PersonSpec {
    PersonSpec {
        vehicle: driver_attrs(),
        pedestrian: PedestrianAttrs::default(),
        home,
        schedule: vec![ScheduleEntry::once(vec![
            Trip::new(TripMode::DriveOnly, end).departing_at(0.0),
        ])],
    }
}

/// One-lane corridor: 300 m approach → 20 m junction lane → 700 m exit,
/// optionally signal-controlled at the junction.
struct Corridor {
    map: MapData,
    approach: LaneId,
    junc: LaneId,
    exit: LaneId,
}

fn one_lane_corridor(program: Option<LightProgram>) -> Corridor {
    let mut b = MapBuilder::new();
    let approach = b.add_lane(drive_lane(300.0, 20.0));
    let exit = b.add_lane(drive_lane(700.0, 20.0));
    let junc = b.add_lane(drive_lane(20.0, 20.0));
    b.connect(approach, junc);
    b.connect(junc, exit);
    let r0 = b.add_road(RoadSpec { name: "approach".into(), lanes: vec![approach] });
    let r1 = b.add_road(RoadSpec { name: "exit".into(), lanes: vec![exit] });
    b.add_junction(JunctionSpec {
        lanes: vec![junc],
        groups: vec![GroupSpec { in_road: r0, out_road: r1, lanes: vec![junc] }],
        phases: vec![],
        fixed_program: program,
    });
    Corridor { map: b.build().unwrap(), approach, junc, exit }
}

fn all_red_forever() -> LightProgram {
    LightProgram {
        phases: vec![
            ProgramPhase { states: vec![LightState::Red], duration: 100_000.0 },
            ProgramPhase { states: vec![LightState::Green], duration: 1.0 },
        ],
    }
}

fn assert_lane_order(map: &MapData) {
    for lane in &map.lanes {
        let keys = lane.vehicles.keys();
        assert!(
            keys.windows(2).all(|w| w[0] <= w[1]),
            "lane {} vehicles out of order: {keys:?}",
            lane.id()
        );
        let keys = lane.pedestrians.keys();
        assert!(
            keys.windows(2).all(|w| w[0] <= w[1]),
            "lane {} pedestrians out of order: {keys:?}",
            lane.id()
        );
    }
}

fn assert_position_exclusive(sim: &Simulation) {
    for snap in sim.persons.snapshots() {
        assert!(
            snap.lane.is_some() != snap.aoi.is_some(),
            "person holds lane and aoi at once (or neither): {snap:?}"
        );
    }
}

// ── S1: single vehicle, straight road, no lights ──────────────────────────────

#[test]
fn s1_single_vehicle_free_flow() {
    init_tracing();
    let t = one_lane_corridor(None);
    let home = PositionSpec::Lane { lane: t.approach, s: 0.0 };
    let end = PositionSpec::Lane { lane: t.exit, s: 690.0 };
    let mut sim = SimBuilder::new(config(100), t.map)
        .person(drive_spec(home, end))
        .build()
        .unwrap();

    let id = PersonId(0);
    let mut min_a: f64 = f64::INFINITY;
    for _ in 0..55 {
        sim.run_ticks(1);
        let snap = sim.persons.snapshot(id);
        if snap.status == Status::Driving && snap.action.a.is_finite() {
            min_a = min_a.min(snap.action.a);
        }
        assert_lane_order(&sim.map);
        assert_position_exclusive(&sim);
    }
    let snap = *sim.persons.snapshot(id);
    // ≈ 20·50 − 20²/(2·2) = 900 m covered: well past the 320 m to the exit
    // road, not yet at the 1020 m trip end.
    assert_eq!(snap.lane, Some(t.exit), "snapshot: {snap:?}");
    assert!(snap.s > 400.0 && snap.s < 680.0, "s = {}", snap.s);
    // Free flow never demands real braking (only speed-tracking noise).
    assert!(min_a > -1.0, "min acceleration {min_a}");
    let stats = sim.global_stats();
    assert!(
        stats.travel_distance > 700.0 && stats.travel_distance < 1_050.0,
        "distance {}",
        stats.travel_distance
    );
}

#[test]
fn s1_vehicle_reaches_trip_end_and_sleeps() {
    let t = one_lane_corridor(None);
    let home = PositionSpec::Lane { lane: t.approach, s: 0.0 };
    let end = PositionSpec::Lane { lane: t.exit, s: 400.0 };
    let mut sim = SimBuilder::new(config(200), t.map)
        .person(drive_spec(home, end))
        .build()
        .unwrap();
    sim.run_ticks(120);
    let snap = *sim.persons.snapshot(PersonId(0));
    assert_eq!(snap.status, Status::Sleep);
    assert_eq!(snap.lane, Some(t.exit));
    assert!((snap.s - 400.0).abs() < 1e-9);
    assert_eq!(snap.v, 0.0);
    assert_eq!(sim.global_stats().completed_trips, 1);
    // The lane lists are empty again.
    assert_eq!(sim.map.lane(t.exit).vehicles.len(), 0);
}

// ── S2: car following never collides ──────────────────────────────────────────

#[test]
fn s2_follower_keeps_a_gap_behind_a_stopped_leader() {
    let t = one_lane_corridor(Some(all_red_forever()));
    let end = PositionSpec::Lane { lane: t.exit, s: 690.0 };
    let leader = drive_spec(PositionSpec::Lane { lane: t.approach, s: 50.0 }, end);
    let follower = drive_spec(PositionSpec::Lane { lane: t.approach, s: 0.0 }, end);
    let mut sim = SimBuilder::new(config(120), t.map)
        .person(leader)
        .person(follower)
        .build()
        .unwrap();

    for _ in 0..100 {
        sim.run_ticks(1);
        let lead = sim.persons.snapshot(PersonId(0));
        let follow = sim.persons.snapshot(PersonId(1));
        if lead.status == Status::Driving && follow.status == Status::Driving {
            let lead_len = sim.persons.person(PersonId(0)).vehicle_attrs().length;
            let gap = lead.s - lead_len - follow.s;
            assert!(gap > 0.0, "follower collided: gap {gap}");
            // Selected acceleration stays inside the physical envelope.
            for snap in [lead, follow] {
                if snap.action.a.is_finite() {
                    let attrs = driver_attrs();
                    assert!(
                        snap.action.a >= attrs.max_braking_acc - 1e-9
                            && snap.action.a <= attrs.max_acc + 1e-9,
                        "a = {}",
                        snap.action.a
                    );
                }
            }
        }
        assert_lane_order(&sim.map);
    }
    // Both queued at the red light with a healthy standstill gap.
    let lead = sim.persons.snapshot(PersonId(0));
    let follow = sim.persons.snapshot(PersonId(1));
    assert!(lead.v < 1.0 && follow.v < 1.0, "v = {} / {}", lead.v, follow.v);
    let gap = lead.s - 5.0 - follow.s;
    assert!(gap >= 1.0, "standstill gap {gap}");
}

// ── S3: stopping for a red light ──────────────────────────────────────────────

#[test]
fn s3_vehicle_stops_before_the_stop_line() {
    let t = one_lane_corridor(Some(all_red_forever()));
    let home = PositionSpec::Lane { lane: t.approach, s: 0.0 };
    let end = PositionSpec::Lane { lane: t.exit, s: 690.0 };
    let mut sim = SimBuilder::new(config(120), t.map)
        .person(drive_spec(home, end))
        .build()
        .unwrap();

    let id = PersonId(0);
    for _ in 0..90 {
        sim.run_ticks(1);
        let snap = sim.persons.snapshot(id);
        if snap.status == Status::Driving {
            // Never into the junction: the stop line is the approach's end.
            assert_eq!(snap.lane, Some(t.approach), "entered {:?}", snap.lane);
            assert!(snap.s <= 300.0 + 0.5, "overshot to {}", snap.s);
        }
        // Lights committed in prepare are never negative.
        assert!(sim.map.lane(t.junc).light().remaining >= 0.0);
    }
    let snap = sim.persons.snapshot(id);
    assert_eq!(snap.status, Status::Driving);
    assert!(snap.v < 1.0, "v at the line: {}", snap.v);
    assert!(snap.s > 280.0, "stopped far from the line: {}", snap.s);
}

// ── S4: mandatory lane change ─────────────────────────────────────────────────

/// Two-lane road whose junction only admits the right lane; a vehicle
/// starting on the left lane must change and traverse the junction.
#[test]
fn s4_forced_lane_change_reaches_the_next_road() {
    init_tracing();
    let mut b = MapBuilder::new();
    let left = b.add_lane(drive_lane(300.0, 10.0));
    let right = b.add_lane(drive_lane(300.0, 10.0));
    let exit = b.add_lane(drive_lane(500.0, 10.0));
    let junc = b.add_lane(drive_lane(20.0, 10.0));
    b.connect(right, junc);
    b.connect(junc, exit);
    let r0 = b.add_road(RoadSpec { name: "in".into(), lanes: vec![left, right] });
    let r1 = b.add_road(RoadSpec { name: "out".into(), lanes: vec![exit] });
    b.add_junction(JunctionSpec {
        lanes: vec![junc],
        groups: vec![GroupSpec { in_road: r0, out_road: r1, lanes: vec![junc] }],
        ..Default::default()
    });
    let map = b.build().unwrap();

    let home = PositionSpec::Lane { lane: left, s: 10.0 };
    let end = PositionSpec::Lane { lane: exit, s: 490.0 };
    let mut sim = SimBuilder::new(config(200), map)
        .person(drive_spec(home, end))
        .build()
        .unwrap();

    let id = PersonId(0);
    let mut changed_before_junction = false;
    let mut dual_presence_seen = false;
    for _ in 0..150 {
        sim.run_ticks(1);
        let snap = sim.persons.snapshot(id);
        if snap.lc.is_lc {
            // Dual presence: one node on the lane, one on the shadow lane.
            assert_ne!(snap.lane, snap.lc.shadow_lane);
            assert!((0.0..1.0).contains(&snap.lc.completed_ratio));
            dual_presence_seen = true;
        }
        if snap.lane == Some(right) && snap.status == Status::Driving {
            changed_before_junction = true;
        }
        assert_lane_order(&sim.map);
        if snap.status == Status::Sleep {
            break;
        }
    }
    assert!(changed_before_junction, "vehicle never moved to the right lane");
    assert!(dual_presence_seen, "no lane-change state observed");
    let snap = sim.persons.snapshot(id);
    assert_eq!(snap.status, Status::Sleep, "trip never completed: {snap:?}");
    assert_eq!(snap.lane, Some(exit));
}

// ── S6: pedestrian at a red crosswalk ─────────────────────────────────────────

#[test]
fn s6_pedestrian_waits_for_green() {
    let mut b = MapBuilder::new();
    let sidewalk_in = b.add_lane(walk_lane(30.0));
    let crossing = b.add_lane(walk_lane(10.0));
    let sidewalk_out = b.add_lane(walk_lane(30.0));
    b.connect(sidewalk_in, crossing);
    b.connect(crossing, sidewalk_out);
    // Roads need a driving lane each; they are otherwise unused.
    let d0 = b.add_lane(drive_lane(30.0, 10.0));
    let d1 = b.add_lane(drive_lane(30.0, 10.0));
    b.add_road(RoadSpec { name: "in".into(), lanes: vec![d0, sidewalk_in] });
    b.add_road(RoadSpec { name: "out".into(), lanes: vec![d1, sidewalk_out] });
    b.add_junction(JunctionSpec {
        lanes: vec![crossing],
        groups: vec![],
        phases: vec![],
        fixed_program: Some(LightProgram {
            phases: vec![
                ProgramPhase { states: vec![LightState::Red], duration: 30.0 },
                ProgramPhase { states: vec![LightState::Green], duration: 30.0 },
            ],
        }),
    });
    let map = b.build().unwrap();

    let spec = PersonSpec {
        vehicle: driver_attrs(),
        pedestrian: PedestrianAttrs::default(),
        home: PositionSpec::Lane { lane: sidewalk_in, s: 25.0 },
        schedule: vec![ScheduleEntry::once(vec![
            Trip::new(TripMode::WalkOnly, PositionSpec::Lane { lane: sidewalk_out, s: 5.0 })
                .departing_at(0.0),
        ])],
    };
    let mut sim = SimBuilder::new(config(100), map).person(spec).build().unwrap();

    let id = PersonId(0);
    let mut waited_at_red = false;
    for _ in 0..90 {
        sim.run_ticks(1);
        let snap = sim.persons.snapshot(id);
        if snap.status == Status::Walking
            && snap.lane == Some(sidewalk_in)
            && snap.v == 0.0
            && sim.map.lane(crossing).light().state == LightState::Red
        {
            waited_at_red = true;
            // Walkers are displayed with their personal lateral offset.
            let display = sim.persons.person(id).display_xyz(&sim.map, snap);
            assert!(display.x.is_finite() && display.y.is_finite());
        }
        if snap.status == Status::Sleep {
            break;
        }
    }
    assert!(waited_at_red, "pedestrian never halted at the red crossing");
    let snap = sim.persons.snapshot(id);
    assert_eq!(snap.status, Status::Sleep, "never arrived: {snap:?}");
    assert_eq!(snap.lane, Some(sidewalk_out));
}

// ── Laws ──────────────────────────────────────────────────────────────────────

#[test]
fn determinism_two_runs_match_per_step() {
    let build = || {
        let t = one_lane_corridor(None);
        let end = PositionSpec::Lane { lane: t.exit, s: 690.0 };
        SimBuilder::new(config(100), t.map)
            .person(drive_spec(PositionSpec::Lane { lane: t.approach, s: 50.0 }, end))
            .person(drive_spec(PositionSpec::Lane { lane: t.approach, s: 0.0 }, end))
            .build()
            .unwrap()
    };
    let mut a = build();
    let mut b = build();
    for step in 0..80 {
        a.run_ticks(1);
        b.run_ticks(1);
        for (sa, sb) in a.persons.snapshots().iter().zip(b.persons.snapshots()) {
            assert_eq!(sa.status, sb.status, "step {step}");
            assert_eq!(sa.lane, sb.lane, "step {step}");
            assert_eq!(sa.s.to_bits(), sb.s.to_bits(), "step {step}");
            assert_eq!(sa.v.to_bits(), sb.v.to_bits(), "step {step}");
        }
    }
}

#[test]
fn conservation_no_person_appears_or_vanishes() {
    // The corridor again, with a home AOI on the approach and a destination
    // AOI on the exit.
    let mut builder = MapBuilder::new();
    let approach = builder.add_lane(drive_lane(300.0, 20.0));
    let exit = builder.add_lane(drive_lane(700.0, 20.0));
    let junc = builder.add_lane(drive_lane(20.0, 20.0));
    builder.connect(approach, junc);
    builder.connect(junc, exit);
    let r0 = builder.add_road(RoadSpec { name: String::new(), lanes: vec![approach] });
    let r1 = builder.add_road(RoadSpec { name: String::new(), lanes: vec![exit] });
    builder.add_junction(JunctionSpec {
        lanes: vec![junc],
        groups: vec![GroupSpec { in_road: r0, out_road: r1, lanes: vec![junc] }],
        ..Default::default()
    });
    let home_aoi = builder.add_aoi(AoiSpec {
        boundary: vec![Point::new(0.0, 10.0), Point::new(5.0, 10.0), Point::new(5.0, 15.0)],
        driving_gates: vec![(approach, 10.0)],
        ..Default::default()
    });
    let dest_aoi = builder.add_aoi(AoiSpec {
        boundary: vec![Point::new(900.0, 10.0), Point::new(905.0, 10.0), Point::new(905.0, 15.0)],
        driving_gates: vec![(exit, 600.0)],
        ..Default::default()
    });
    let map = builder.build().unwrap();

    let mut sim = SimBuilder::new(config(200), map)
        .person(drive_spec(PositionSpec::Aoi(home_aoi), PositionSpec::Aoi(dest_aoi)))
        .build()
        .unwrap();

    for _ in 0..150 {
        sim.run_ticks(1);
        let in_aois: usize = sim.map.aois.iter().map(|a| a.occupant_count()).sum();
        let on_lanes = sim
            .persons
            .snapshots()
            .iter()
            .filter(|s| s.lane.is_some())
            .count();
        assert_eq!(in_aois + on_lanes, 1, "person count drifted");
    }
    // The trip completed into the destination AOI.
    assert_eq!(sim.map.aoi(dest_aoi).occupant_count(), 1);
    assert_eq!(sim.map.aoi(home_aoi).occupant_count(), 0);
}

// ── Control surface ───────────────────────────────────────────────────────────

mod control_tests {
    use super::*;
    use crate::control::ControlError;

    fn sleeping_sim() -> (Simulation, LaneId) {
        let t = one_lane_corridor(None);
        let approach = t.approach;
        let spec = PersonSpec {
            vehicle: driver_attrs(),
            pedestrian: PedestrianAttrs::default(),
            home: PositionSpec::Lane { lane: approach, s: 0.0 },
            schedule: vec![], // never departs
        };
        let sim = SimBuilder::new(config(100), t.map).person(spec).build().unwrap();
        (sim, approach)
    }

    #[test]
    fn person_queries_and_filters() {
        let (mut sim, _) = sleeping_sim();
        sim.run_ticks(1);
        let runtime = sim.person_runtime(PersonId(0)).unwrap();
        assert_eq!(runtime.status, Status::Sleep);
        assert!(sim.person_runtime(PersonId(9)).is_err());

        let all = sim.list_persons(&PersonFilter::default());
        assert_eq!(all.len(), 1);
        let none = sim.list_persons(&PersonFilter {
            exclude_statuses: vec![Status::Sleep],
            ..Default::default()
        });
        assert!(none.is_empty());
    }

    #[test]
    fn reset_position_requires_sleep_and_valid_target() {
        let (mut sim, lane) = sleeping_sim();
        sim.run_ticks(1);
        assert!(sim
            .reset_person_position(PersonId(0), PositionSpec::Lane { lane, s: 42.0 })
            .is_ok());
        sim.run_ticks(1);
        assert!((sim.person_runtime(PersonId(0)).unwrap().s - 42.0).abs() < 1e-9);

        let err = sim.reset_person_position(PersonId(0), PositionSpec::Lane {
            lane: LaneId(999),
            s: 0.0,
        });
        assert!(matches!(err, Err(ControlError::UnknownPosition)));
    }

    #[test]
    fn schedule_set_rejected_inside_junctions() {
        let t = one_lane_corridor(None);
        let end = PositionSpec::Lane { lane: t.exit, s: 690.0 };
        let mut sim = SimBuilder::new(config(100), t.map)
            .person(drive_spec(PositionSpec::Lane { lane: t.approach, s: 280.0 }, end))
            .build()
            .unwrap();
        // Drive until the vehicle is inside the junction lane.
        let mut in_junction = false;
        for _ in 0..30 {
            sim.run_ticks(1);
            if sim.persons.person(PersonId(0)).runtime.lane == Some(t.junc) {
                in_junction = true;
                break;
            }
        }
        assert!(in_junction, "vehicle never entered the junction");
        let err = sim.set_schedule(PersonId(0), vec![]);
        assert!(matches!(err, Err(ControlError::InJunction(_))));
    }

    #[test]
    fn add_person_mid_run() {
        let (mut sim, lane) = sleeping_sim();
        sim.run_ticks(5);
        let spec = PersonSpec {
            vehicle: driver_attrs(),
            pedestrian: PedestrianAttrs::default(),
            home: PositionSpec::Lane { lane, s: 100.0 },
            schedule: vec![],
        };
        let id = sim.add_person(spec).unwrap();
        assert_eq!(id, PersonId(1));
        sim.run_ticks(1);
        assert_eq!(sim.person_runtime(id).unwrap().lane, Some(lane));
        assert_eq!(sim.list_persons(&PersonFilter::default()).len(), 2);
    }

    #[test]
    fn traffic_light_surface_round_trips() {
        let t = one_lane_corridor(Some(all_red_forever()));
        let mut sim = SimBuilder::new(config(100), t.map).build().unwrap();
        let junction = sim.map.lane(t.junc).parent_junction().unwrap();
        sim.run_ticks(1);

        let state = sim.traffic_light(junction).unwrap();
        assert!(state.ok);
        assert_eq!(state.phase_index, Some(0));
        assert!(state.program.is_some());

        sim.set_traffic_light_ok(junction, false).unwrap();
        sim.run_ticks(2);
        assert_eq!(sim.map.lane(t.junc).light().state, LightState::Green);

        assert!(sim.traffic_light(mts_core::JunctionId(9)).is_err());
    }
}

// ── Run loop ──────────────────────────────────────────────────────────────────

#[test]
fn run_honors_end_step_and_observer() {
    struct Counter {
        starts: u32,
        prepared: u32,
        ends: u32,
        finished: bool,
    }
    impl crate::observer::SimObserver for Counter {
        fn on_tick_start(&mut self, _s: u32) {
            self.starts += 1;
        }
        fn on_prepare_complete(&mut self, _s: u32) {
            self.prepared += 1;
        }
        fn on_tick_end(&mut self, _s: u32) {
            self.ends += 1;
        }
        fn on_sim_end(&mut self, _s: u32) {
            self.finished = true;
        }
    }

    let t = one_lane_corridor(None);
    let mut sim = SimBuilder::new(config(10), t.map).build().unwrap();
    let mut counter = Counter { starts: 0, prepared: 0, ends: 0, finished: false };
    sim.run(&mut counter);
    assert!(counter.finished);
    assert_eq!(counter.starts, counter.ends);
    assert_eq!(counter.starts, counter.prepared);
    assert!(counter.starts > 0 && counter.starts <= 10);
    assert!(sim.clock.step + 1 >= sim.clock.end_step);
}

#[test]
fn stop_handle_interrupts_the_run() {
    let t = one_lane_corridor(None);
    let mut sim = SimBuilder::new(config(1_000_000), t.map).build().unwrap();
    let stop = sim.stop_handle();
    struct StopAfter {
        n: u32,
        stop: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }
    impl crate::observer::SimObserver for StopAfter {
        fn on_tick_end(&mut self, step: u32) {
            if step >= self.n {
                self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }
    let mut observer = StopAfter { n: 5, stop };
    sim.run(&mut observer);
    assert!(sim.clock.step >= 5 && sim.clock.step < 100);
}

#[test]
fn noop_observer_runs_to_completion() {
    let t = one_lane_corridor(None);
    let mut sim = SimBuilder::new(config(5), t.map).build().unwrap();
    sim.run(&mut NoopObserver);
    assert!(sim.clock.step + 1 >= sim.clock.end_step);
}
