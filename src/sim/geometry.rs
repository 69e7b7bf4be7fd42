//! 2D geometry kernel
//!
//! Circle-vs-segment support: distances, segment crossing tests, and
//! polyline helpers. All functions are pure.

use glam::Vec2;

/// Denominator magnitude below which two segments count as parallel
pub const PARALLEL_EPSILON: f32 = 1e-4;

/// Distance from `p` to the closed segment `a`-`b`
///
/// A degenerate segment (`a == b`) yields the plain point distance.
pub fn distance_point_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Whether segments `p1`-`p2` and `p3`-`p4` cross
///
/// Parallel segments (including collinear overlaps) are reported as
/// non-intersecting.
pub fn segments_intersect(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> bool {
    let denom = (p1.x - p2.x) * (p3.y - p4.y) - (p1.y - p2.y) * (p3.x - p4.x);
    if denom.abs() < PARALLEL_EPSILON {
        return false;
    }

    let t = ((p1.x - p3.x) * (p3.y - p4.y) - (p1.y - p3.y) * (p3.x - p4.x)) / denom;
    let u = -((p1.x - p2.x) * (p1.y - p3.y) - (p1.y - p2.y) * (p1.x - p3.x)) / denom;

    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

/// Approximate minimum distance between two segments
///
/// Only the four endpoint-to-opposite-segment distances are considered, so a
/// crossing pair can report a positive distance. Pair with
/// [`segments_intersect`] when that matters.
pub fn min_distance_between_segments(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> f32 {
    distance_point_to_segment(p1, p3, p4)
        .min(distance_point_to_segment(p2, p3, p4))
        .min(distance_point_to_segment(p3, p1, p2))
        .min(distance_point_to_segment(p4, p1, p2))
}

/// Total length of a polyline
pub fn polyline_length(points: &[Vec2]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Endpoint-preserving smoothing: on each pass every interior point becomes
/// a weighted average of itself and its neighbours. `weights` is
/// (previous, self, next).
pub fn smooth_polyline(points: &[Vec2], weights: [f32; 3], passes: usize) -> Vec<Vec2> {
    let mut current = points.to_vec();
    if current.len() < 3 {
        return current;
    }

    let [w_prev, w_self, w_next] = weights;
    for _ in 0..passes {
        let mut next = Vec::with_capacity(current.len());
        next.push(current[0]);
        for w in current.windows(3) {
            next.push(w[0] * w_prev + w[1] * w_self + w[2] * w_next);
        }
        next.push(current[current.len() - 1]);
        current = next;
    }
    current
}

/// Cosmetic curve kept alongside each drawn line
///
/// One broad pass followed by three gentler ones.
pub fn collision_curve(points: &[Vec2]) -> Vec<Vec2> {
    let broad = smooth_polyline(points, [0.25, 0.5, 0.25], 1);
    smooth_polyline(&broad, [0.2, 0.6, 0.2], 3)
}

/// Vertices of a regular hexagon, first vertex on the +x axis
pub fn hexagon(center: Vec2, radius: f32) -> [Vec2; 6] {
    std::array::from_fn(|i| {
        let angle = i as f32 * std::f32::consts::FRAC_PI_3;
        center + Vec2::new(angle.cos(), angle.sin()) * radius
    })
}

/// Reflect velocity around a unit normal
#[inline]
pub fn reflect_velocity(v: Vec2, n: Vec2) -> Vec2 {
    v - 2.0 * v.dot(n) * n
}
