//! Small vector-geometry helpers shared by the navigator and estimator.
//!
//! Ported from `original_source/src/lib/math_utils.py`; 2-D vectors are
//! plain `(f64, f64)` tuples rather than a `Vec2` newtype, matching the
//! teacher's preference for the simplest type that satisfies the call site.

pub type Point = (f64, f64);

/// Euclidean distance between two points.
pub fn distance(p1: Point, p2: Point) -> f64 {
    ((p1.0 - p2.0).powi(2) + (p1.1 - p2.1).powi(2)).sqrt()
}

fn norm(v: Point) -> f64 {
    (v.0 * v.0 + v.1 * v.1).sqrt()
}

fn unit_vector(v: Point) -> Point {
    let n = norm(v);
    (v.0 / n, v.1 / n)
}

fn dot(v1: Point, v2: Point) -> f64 {
    v1.0 * v2.0 + v1.1 * v2.1
}

fn cross(v1: Point, v2: Point) -> f64 {
    v1.0 * v2.1 - v1.1 * v2.0
}

/// Unsigned angle in radians between `v1` and `v2`, in `[0, pi]`.
pub fn angle_between(v1: Point, v2: Point) -> f64 {
    let v1u = unit_vector(v1);
    let v2u = unit_vector(v2);
    dot(v1u, v2u).clamp(-1.0, 1.0).acos()
}

/// Signed angle in radians from `v1` to `v2`, in `[-pi, pi]`.
///
/// Positive `cross(v1, v2)` is a clockwise turn in this system's screen-like
/// convention (theta measured clockwise from +y, see `Geofence`), so it
/// flips the sign of the unsigned angle rather than following the usual
/// right-hand-rule convention.
pub fn signed_angle_between(v1: Point, v2: Point) -> f64 {
    let angle = angle_between(v1, v2);
    if cross(v1, v2) > 0.0 { -angle } else { angle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn distance_basic() {
        assert!((distance((0.0, 0.0), (3.0, 4.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn signed_angle_known_values() {
        assert!((signed_angle_between((1.0, 0.0), (0.0, 1.0)) - (-PI / 2.0)).abs() < 1e-9);
        assert!((signed_angle_between((0.0, 1.0), (1.0, 0.0)) - (PI / 2.0)).abs() < 1e-9);
        assert!((signed_angle_between((0.1, 1.0), (0.3, -0.3)) - 2.2565).abs() < 1e-3);
    }
}
