//! Planar geometry for lane centerlines and AOI polygons.
//!
//! Lanes are polylines in a projected (metric) coordinate system.  Arc
//! positions (`s`) are distances along the centerline from its start; the
//! helpers here convert between `s` and world coordinates and back.

/// A point in the projected map frame, metres.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar distance to `other` (z ignored).
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Linear interpolation: `a` at `k = 0`, `b` at `k = 1`.
pub fn blend(a: Point, b: Point, k: f64) -> Point {
    Point {
        x: a.x + (b.x - a.x) * k,
        y: a.y + (b.y - a.y) * k,
        z: a.z + (b.z - a.z) * k,
    }
}

// ── Polyline arithmetic ───────────────────────────────────────────────────────

/// Cumulative arc lengths of a polyline, starting at 0.
///
/// The result has the same length as `line`; the last entry is the total
/// length.
pub fn polyline_lengths(line: &[Point]) -> Vec<f64> {
    let mut lengths = Vec::with_capacity(line.len());
    let mut acc = 0.0;
    lengths.push(0.0);
    for pair in line.windows(2) {
        acc += pair[0].distance(&pair[1]);
        lengths.push(acc);
    }
    lengths
}

/// Per-segment headings (atan2) of a polyline.  Length `line.len() - 1`.
pub fn polyline_directions(line: &[Point]) -> Vec<f64> {
    line.windows(2)
        .map(|pair| (pair[1].y - pair[0].y).atan2(pair[1].x - pair[0].x))
        .collect()
}

/// Index of the segment containing arc position `s`.
///
/// `lengths` must be the cumulative lengths of the polyline; `s` is clamped
/// to its range.
fn segment_at(lengths: &[f64], s: f64) -> (usize, f64) {
    let s = s.clamp(lengths[0], lengths[lengths.len() - 1]);
    // partition_point: first index whose cumulative length exceeds s.
    let i = lengths.partition_point(|&l| l <= s).min(lengths.len() - 1);
    if i == 0 {
        return (0, 0.0);
    }
    let (low, high) = (lengths[i - 1], lengths[i]);
    let k = if high > low { (s - low) / (high - low) } else { 0.0 };
    (i - 1, k)
}

/// World position at arc position `s` along the polyline.
pub fn position_at(line: &[Point], lengths: &[f64], s: f64) -> Point {
    if line.len() == 1 {
        return line[0];
    }
    let (i, k) = segment_at(lengths, s);
    blend(line[i], line[i + 1], k)
}

/// Heading (radians) at arc position `s` along the polyline.
pub fn direction_at(directions: &[f64], lengths: &[f64], s: f64) -> f64 {
    if directions.is_empty() {
        return 0.0;
    }
    let (i, _) = segment_at(lengths, s);
    directions[i.min(directions.len() - 1)]
}

/// World position at arc position `s`, shifted `offset` metres to the right
/// of the direction of travel.
pub fn offset_position_at(
    line: &[Point],
    lengths: &[f64],
    directions: &[f64],
    s: f64,
    offset: f64,
) -> Point {
    let base = position_at(line, lengths, s);
    let dir = direction_at(directions, lengths, s);
    let (nx, ny) = ((dir - std::f64::consts::FRAC_PI_2).cos(), (dir - std::f64::consts::FRAC_PI_2).sin());
    Point { x: base.x + nx * offset, y: base.y + ny * offset, z: base.z }
}

/// Arc position of the point on the polyline closest to `pos`.
pub fn project_to_polyline(line: &[Point], lengths: &[f64], pos: Point) -> f64 {
    let mut best_s = 0.0;
    let mut best_d2 = f64::INFINITY;
    for (i, pair) in line.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len2 = dx * dx + dy * dy;
        let t = if len2 > 0.0 {
            (((pos.x - a.x) * dx + (pos.y - a.y) * dy) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let proj = Point { x: a.x + dx * t, y: a.y + dy * t, z: 0.0 };
        let d2 = (pos.x - proj.x).powi(2) + (pos.y - proj.y).powi(2);
        if d2 < best_d2 {
            best_d2 = d2;
            best_s = lengths[i] + (lengths[i + 1] - lengths[i]) * t;
        }
    }
    best_s
}

// ── Polygons ──────────────────────────────────────────────────────────────────

/// Planar centroid of a polygon given as a closed ring (first point repeated
/// last, or not — both accepted).  Falls back to the vertex mean for
/// degenerate rings.  The z coordinate is the vertex mean.
pub fn polygon_centroid(ring: &[Point]) -> Point {
    let n = ring.len();
    if n == 0 {
        return Point::default();
    }
    let mean_z = ring.iter().map(|p| p.z).sum::<f64>() / n as f64;
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let cross = a.x * b.y - b.x * a.y;
        area2 += cross;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    if area2.abs() < 1e-12 {
        let mut mean = Point::default();
        for p in ring {
            mean.x += p.x;
            mean.y += p.y;
        }
        mean.x /= n as f64;
        mean.y /= n as f64;
        mean.z = mean_z;
        return mean;
    }
    Point { x: cx / (3.0 * area2), y: cy / (3.0 * area2), z: mean_z }
}
