//! Geofence geometry: point-in-polygon, ray-to-wall distance, uniform
//! sampling. Ported from `original_source/src/lib/geofence.py`; the
//! formulas (ray-casting inclusion test, wall-intersection parameter `m`,
//! normal-angle `acos`) are preserved exactly — see spec.md §4.4 and §8
//! scenarios 1–2.

use rand::Rng;

use crate::error::{CoreReason, CoreResult};
use crate::math::Point;

/// A closed, simple polygon in the world frame defining the robot's
/// permitted region, plus its precomputed axis-aligned bounding box.
#[derive(Debug, Clone)]
pub struct Geofence {
    points: Vec<Point>,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Geofence {
    /// Build a geofence from parallel coordinate lists. The first and last
    /// points must coincide (closed polygon).
    pub fn new(points_x: &[f64], points_y: &[f64]) -> CoreResult<Self> {
        if points_x.len() != points_y.len() {
            return Err(CoreReason::MalformedGeofence(
                "points_x and points_y must be the same length".into(),
            ));
        }
        if points_x.is_empty() {
            return Err(CoreReason::MalformedGeofence("no points given".into()));
        }
        let points: Vec<Point> = points_x.iter().copied().zip(points_y.iter().copied()).collect();

        let first = points[0];
        let last = *points.last().unwrap();
        if first.0 != last.0 || first.1 != last.1 {
            return Err(CoreReason::MalformedGeofence(
                "first and last point must coincide to form a closed polygon".into(),
            ));
        }

        let mut min_x = first.0;
        let mut max_x = first.0;
        let mut min_y = first.1;
        let mut max_y = first.1;
        for &(x, y) in &points {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        Ok(Self { points, min_x, max_x, min_y, max_y })
    }

    /// Ray-casting point-in-polygon test. Boundary points count as inside
    /// (odd-count inclusive — see spec.md §9 "Tie-break in point-in-polygon").
    pub fn inside_geofence(&self, x: f64, y: f64) -> bool {
        if x < self.min_x || x > self.max_x || y < self.min_y || y > self.max_y {
            return false;
        }

        let mut intersections = 0u32;
        for w in self.points.windows(2) {
            let (x1, y1) = w[0];
            let (x2, y2) = w[1];

            if y >= y1.min(y2) && y <= y1.max(y2) && x <= x1.max(x2) {
                let x_intersect = if y1 != y2 {
                    (y - y1) * (x2 - x1) / (y2 - y1) + x1
                } else {
                    x1.min(x2)
                };

                if x <= x_intersect {
                    intersections += 1;
                }
            }
        }

        intersections % 2 == 1
    }

    /// Distance from `(x, y)` to the closest wall along direction `(sin
    /// theta, cos theta)`, and the angle between the ray and the wall
    /// normal. Returns `(0.0, 0.0)` when no wall is struck in front of the
    /// ray — this is the "unknown" sentinel the estimator treats as
    /// no-update (spec.md §4.7, §9).
    pub fn distance_to_closest_wall(&self, x: f64, y: f64, theta: f64) -> (f64, f64) {
        let mut min_distance = f64::INFINITY;
        let mut hit_edge: Option<(Point, Point)> = None;

        for w in self.points.windows(2) {
            let (x1, y1) = w[0];
            let (x2, y2) = w[1];

            let denominator = (y2 - y1) * theta.sin() - (x2 - x1) * theta.cos();
            if denominator.abs() < 1e-9 {
                continue;
            }

            let numerator = (y2 - y1) * (x1 - x) - (x2 - x1) * (y1 - y);
            let m = numerator / denominator;

            if m > 0.0 && m < min_distance {
                min_distance = m;
                hit_edge = Some(((x1, y1), (x2, y2)));
            }
        }

        match hit_edge {
            Some((v1, v2)) => (min_distance, Self::normal_angle_to_wall(theta, v1, v2)),
            None => (0.0, 0.0),
        }
    }

    fn normal_angle_to_wall(theta: f64, (x1, y1): Point, (x2, y2): Point) -> f64 {
        let denominator = ((y1 - y2).powi(2) + (x2 - x1).powi(2)).sqrt();
        let numerator = theta.cos() * (y1 - y2) + theta.sin() * (x2 - x1);
        (numerator / denominator).clamp(-1.0, 1.0).acos()
    }

    /// Rejection-sample a point uniformly within the bounding box until it
    /// lands inside the polygon.
    pub fn get_random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        loop {
            let x = rng.random_range(self.min_x..=self.max_x);
            let y = rng.random_range(self.min_y..=self.max_y);
            if self.inside_geofence(x, y) {
                return (x, y);
            }
        }
    }

    pub fn get_random_positions<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Point> {
        (0..n).map(|_| self.get_random_position(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Geofence {
        Geofence::new(&[0.0, 1.0, 1.0, 0.0, 0.0], &[0.0, 0.0, 1.0, 1.0, 0.0]).unwrap()
    }

    #[test]
    fn rejects_unclosed_polygon() {
        let err = Geofence::new(&[0.0, 1.0, 1.0], &[0.0, 0.0, 1.0]);
        assert!(err.is_err());
    }

    #[test]
    fn inside_geofence_unit_square() {
        let geo = unit_square();
        assert!(geo.inside_geofence(0.5, 0.5));
        assert!(!geo.inside_geofence(1.5, 1.5));
        assert!(geo.inside_geofence(0.0, 0.0));
        assert!(geo.inside_geofence(1.0, 0.5));
        assert!(!geo.inside_geofence(-0.1, 0.5));
    }

    #[test]
    fn distance_to_closest_wall_unit_square() {
        let geo = unit_square();
        assert!((geo.distance_to_closest_wall(0.5, 0.5, 0.0).0 - 0.5).abs() < 1e-9);
        assert!((geo.distance_to_closest_wall(0.5, 0.5, std::f64::consts::FRAC_PI_2).0 - 0.5).abs() < 1e-9);
        assert!((geo.distance_to_closest_wall(0.1, 0.9, 0.0).0 - 0.1).abs() < 1e-9);
        let (d, _) = geo.distance_to_closest_wall(0.7, 0.6, 3.0 * std::f64::consts::FRAC_PI_4);
        assert!((d - 0.4242).abs() < 1e-3);
    }

    #[test]
    fn random_positions_stay_inside() {
        let geo = unit_square();
        let mut rng = rand::rng();
        for (x, y) in geo.get_random_positions(50, &mut rng) {
            assert!(geo.inside_geofence(x, y));
        }
    }
}
