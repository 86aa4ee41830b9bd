//! Unit tests for mts-core.

use crate::clock::{SimClock, StepConfig};
use crate::geom::{self, Point};
use crate::ids::{LaneId, PersonId};
use crate::rng::PersonRng;

// ── Clock ─────────────────────────────────────────────────────────────────────

mod clock_tests {
    use super::*;

    #[test]
    fn time_tracks_step() {
        let mut clock = SimClock::new(&StepConfig { start: 10, total: 20, interval: 0.5 });
        assert_eq!(clock.step, 10);
        assert!((clock.t - 5.0).abs() < 1e-12);
        clock.advance();
        assert_eq!(clock.step, 11);
        assert!((clock.t - 5.5).abs() < 1e-12);
    }

    #[test]
    fn last_step_detection() {
        let mut clock = SimClock::new(&StepConfig { start: 0, total: 2, interval: 1.0 });
        assert!(!clock.is_last_step());
        clock.advance();
        assert!(clock.is_last_step());
    }

    #[test]
    fn hms_decomposition() {
        let mut clock = SimClock::new(&StepConfig { start: 0, total: 100_000, interval: 1.0 });
        for _ in 0..3_725 {
            clock.advance();
        }
        let (h, m, s) = clock.hms();
        assert_eq!((h, m), (1, 2));
        assert!((s - 5.0).abs() < 1e-9);
        assert_eq!(clock.to_string(), "01:02:05");
    }
}

// ── Ids ───────────────────────────────────────────────────────────────────────

mod id_tests {
    use super::*;

    #[test]
    fn invalid_sentinel_is_default() {
        assert_eq!(LaneId::default(), LaneId::INVALID);
        assert_ne!(LaneId(0), LaneId::INVALID);
    }

    #[test]
    fn index_round_trip() {
        assert_eq!(LaneId(7).index(), 7);
        assert_eq!(usize::from(LaneId(7)), 7);
    }
}

// ── Rng ───────────────────────────────────────────────────────────────────────

mod rng_tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = PersonRng::new(PersonId(3), 0);
        let mut b = PersonRng::new(PersonId(3), 0);
        for _ in 0..16 {
            assert_eq!(a.uniform().to_bits(), b.uniform().to_bits());
        }
    }

    #[test]
    fn seed_offset_changes_sequence() {
        let mut a = PersonRng::new(PersonId(3), 0);
        let mut b = PersonRng::new(PersonId(3), 1);
        let same = (0..16).all(|_| a.uniform().to_bits() == b.uniform().to_bits());
        assert!(!same);
    }

    #[test]
    fn discrete_skips_zero_weights() {
        let mut rng = PersonRng::new(PersonId(0), 0);
        for _ in 0..100 {
            let i = rng.discrete(&[0.0, 1.0]);
            assert_eq!(i, 1);
        }
    }

    #[test]
    fn discrete_roughly_proportional() {
        let mut rng = PersonRng::new(PersonId(1), 0);
        let mut counts = [0usize; 2];
        for _ in 0..10_000 {
            counts[rng.discrete(&[1.0, 3.0])] += 1;
        }
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!(ratio > 2.0 && ratio < 4.5, "ratio {ratio}");
    }

    #[test]
    fn p_true_extremes() {
        let mut rng = PersonRng::new(PersonId(2), 0);
        assert!(!rng.p_true(0.0));
        assert!(rng.p_true(1.1));
    }
}

// ── Geometry ──────────────────────────────────────────────────────────────────

mod geom_tests {
    use super::*;

    fn l_shape() -> (Vec<Point>, Vec<f64>) {
        let line = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(100.0, 50.0)];
        let lengths = geom::polyline_lengths(&line);
        (line, lengths)
    }

    #[test]
    fn cumulative_lengths() {
        let (_, lengths) = l_shape();
        assert_eq!(lengths, vec![0.0, 100.0, 150.0]);
    }

    #[test]
    fn position_interpolates() {
        let (line, lengths) = l_shape();
        let p = geom::position_at(&line, &lengths, 50.0);
        assert!((p.x - 50.0).abs() < 1e-9 && p.y.abs() < 1e-9);
        let p = geom::position_at(&line, &lengths, 125.0);
        assert!((p.x - 100.0).abs() < 1e-9 && (p.y - 25.0).abs() < 1e-9);
    }

    #[test]
    fn position_clamps_out_of_range() {
        let (line, lengths) = l_shape();
        let p = geom::position_at(&line, &lengths, 1000.0);
        assert!((p.x - 100.0).abs() < 1e-9 && (p.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn direction_follows_segments() {
        let (line, lengths) = l_shape();
        let dirs = geom::polyline_directions(&line);
        assert!(geom::direction_at(&dirs, &lengths, 10.0).abs() < 1e-9);
        let d = geom::direction_at(&dirs, &lengths, 120.0);
        assert!((d - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn projection_inverts_position() {
        let (line, lengths) = l_shape();
        let s = geom::project_to_polyline(&line, &lengths, Point::new(40.0, 5.0));
        assert!((s - 40.0).abs() < 1e-9);
        let s = geom::project_to_polyline(&line, &lengths, Point::new(110.0, 25.0));
        assert!((s - 125.0).abs() < 1e-9);
    }

    #[test]
    fn centroid_of_square() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let c = geom::polygon_centroid(&ring);
        assert!((c.x - 5.0).abs() < 1e-9 && (c.y - 5.0).abs() < 1e-9);
    }
}
