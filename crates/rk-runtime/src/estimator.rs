//! Monte Carlo particle-filter position estimator (spec.md §4.7), ported
//! from `original_source/src/mcEstimator.py`'s `MonteCarloPositionEstimator`.
//!
//! Two deliberate departures from the source, both recorded in DESIGN.md:
//! `CircularMoveEstimate` is converted into an equivalent straight-line move
//! (the source silently drops it), and `resample_particles` is actually
//! wired up and corrected (the source builds a `new_particles` list it never
//! assigns back to `self.particles`, and its cumulative-weight loop indexes
//! `cumulative_weights[i - 1]` which wraps to the last element on the first
//! iteration) — this port resamples correctly after every sensor update.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;
use rk_config::Configuration;
use rk_core::geofence::Geofence;
use rk_core::message::{Message, MessageId, Payload};
use rk_core::particle::{move_std, turn_std, Particle};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{RuntimeReason, RuntimeResult};
use crate::hub::{Consumer, Hub};
use crate::log_macros::rk_warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalisationMethod {
    Continuous,
    Global,
}

impl LocalisationMethod {
    fn parse(s: &str) -> RuntimeResult<Self> {
        match s.to_lowercase().as_str() {
            "continuous" => Ok(Self::Continuous),
            "global" => Ok(Self::Global),
            other => Err(RuntimeReason::Configuration(rk_config::ConfigurationError::TypeMismatch {
                object: "MCPositionEstimator".to_string(),
                key: format!("localisation (got '{other}')"),
                expected: "'continuous' or 'global'",
            })),
        }
    }
}

pub struct MonteCarloEstimator<R: Rng> {
    hub: Hub,
    localisation: LocalisationMethod,
    start: (f64, f64, f64),
    num_particles: usize,
    particles: Vec<Particle>,
    geofence: Geofence,
    rng: R,
}

impl<R: Rng> MonteCarloEstimator<R> {
    pub fn new(hub: Hub, conf: &Configuration, geofence: Geofence, mut rng: R) -> RuntimeResult<Self> {
        let localisation_str = conf.get_str("MCPositionEstimator", "localisation", "global", true)?;
        let localisation = LocalisationMethod::parse(&localisation_str)?;

        let start = if localisation == LocalisationMethod::Continuous {
            let x = conf.get_float("MCPositionEstimator", "start_x", 0.0, true)?;
            let y = conf.get_float("MCPositionEstimator", "start_y", 0.0, true)?;
            let heading_deg = conf.get_float("MCPositionEstimator", "start_hed", 0.0, true)?;
            (x, y, heading_deg.to_radians())
        } else {
            (0.0, 0.0, 0.0)
        };

        let num_particles = conf.get_int("MCPositionEstimator", "num_particles", 0, true)? as usize;

        let particles = Self::initial_particles(localisation, start, num_particles, &geofence, &mut rng);

        Ok(Self { hub, localisation, start, num_particles, particles, geofence, rng })
    }

    fn initial_particles(
        localisation: LocalisationMethod,
        start: (f64, f64, f64),
        num_particles: usize,
        geofence: &Geofence,
        rng: &mut R,
    ) -> Vec<Particle> {
        if num_particles == 0 {
            return Vec::new();
        }
        let weight = 1.0 / num_particles as f64;
        match localisation {
            LocalisationMethod::Continuous => {
                (0..num_particles).map(|_| Particle::new(start.0, start.1, start.2, weight)).collect()
            }
            LocalisationMethod::Global => geofence
                .get_random_positions(num_particles, rng)
                .into_iter()
                .map(|(x, y)| {
                    let theta = rng.random_range(0.0..std::f64::consts::TAU);
                    Particle::new(x, y, theta, weight)
                })
                .collect(),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn estimate_position(&self) -> (f64, f64, f64) {
        self.particles.iter().fold((0.0, 0.0, 0.0), |(x, y, theta), p| {
            (x + p.x * p.weight, y + p.y * p.weight, theta + p.theta * p.weight)
        })
    }

    fn publish_estimate(&self) {
        let (x, y, theta) = self.estimate_position();
        self.hub.deliver(Payload::NavigationEstimate { x, y, theta });
    }

    /// Shared tail of every motion update: drop particles that left the
    /// geofence, renormalise if any were dropped, publish the new estimate.
    fn finish_motion_update(&mut self) {
        let before = self.particles.len();
        self.particles.retain(|p| self.geofence.inside_geofence(p.x, p.y));
        if self.particles.len() != before {
            self.normalise_weights();
        }
        self.publish_estimate();
    }

    pub fn handle_move_estimate(&mut self, distance: f64, distance_std: f64, theta_std: f64) {
        for particle in &mut self.particles {
            move_std(particle, distance, distance_std, theta_std, &mut self.rng);
        }
        self.finish_motion_update();
    }

    pub fn handle_turn_estimate(&mut self, theta: f64, theta_std: f64) {
        for particle in &mut self.particles {
            turn_std(particle, theta, theta_std, &mut self.rng);
        }
        self.finish_motion_update();
    }

    /// Converts the arc into an equivalent straight-line move: the particle
    /// first turns by the arc's net heading change `angle`, then advances by
    /// the chord length `2r·sin(angle/2)` with the arc's own noise terms —
    /// see DESIGN.md for why this, rather than dropping the message.
    pub fn handle_circular_move_estimate(&mut self, radius: f64, angle: f64, radius_std: f64, theta_std: f64) {
        let chord = 2.0 * radius * (angle / 2.0).sin();
        for particle in &mut self.particles {
            particle.theta += angle;
            move_std(particle, chord, radius_std, theta_std, &mut self.rng);
        }
        self.finish_motion_update();
    }

    pub fn handle_sonar_reading(&mut self, reading_m: f64, std: f64, constant_std: f64, normal_std: f64) {
        let Ok(normal) = Normal::new(0.0, normal_std) else {
            rk_warn!(est, normal_std, "sonar normal_std is not a valid distribution parameter, skipping update");
            return;
        };

        for particle in &mut self.particles {
            let (d_pred, wall_normal) = self.geofence.distance_to_closest_wall(particle.x, particle.y, particle.theta);
            if d_pred == 0.0 && wall_normal == 0.0 {
                continue;
            }
            let error = d_pred - reading_m;
            let mut likelihood = (-(error * error) / (2.0 * std * std)).exp();
            likelihood *= normal.inverse_cdf(wall_normal);
            likelihood += constant_std;
            particle.weight *= likelihood;
        }

        self.normalise_weights();
        self.resample_particles();
    }

    pub fn normalise_weights(&mut self) {
        if self.particles.is_empty() {
            return;
        }
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if total == 0.0 {
            let weight = 1.0 / self.particles.len() as f64;
            for particle in &mut self.particles {
                particle.weight = weight;
            }
        } else {
            for particle in &mut self.particles {
                particle.weight /= total;
            }
        }
    }

    /// Cumulative-weight binary-search resample. Always produces exactly
    /// `num_particles` output particles, each with weight `1/N` (spec.md §8).
    pub fn resample_particles(&mut self) {
        if self.particles.is_empty() {
            return;
        }

        let mut cumulative = Vec::with_capacity(self.particles.len());
        let mut running = 0.0;
        for particle in &self.particles {
            running += particle.weight;
            cumulative.push(running);
        }
        let total = *cumulative.last().unwrap();
        let weight = 1.0 / self.num_particles as f64;

        let mut resampled = Vec::with_capacity(self.num_particles);
        for _ in 0..self.num_particles {
            let draw = self.rng.random_range(0.0..=total);
            let idx = cumulative.partition_point(|&c| c < draw).min(self.particles.len() - 1);
            let source = &self.particles[idx];
            resampled.push(Particle::new(source.x, source.y, source.theta, weight));
        }
        self.particles = resampled;
    }
}

impl<R: Rng> Consumer for MonteCarloEstimator<R> {
    fn send(&mut self, message: &Message) {
        match &message.payload {
            Payload::MoveEstimate { distance, distance_std, theta_std } => {
                self.handle_move_estimate(*distance, *distance_std, *theta_std);
            }
            Payload::TurnEstimate { theta, theta_std } => {
                self.handle_turn_estimate(*theta, *theta_std);
            }
            Payload::CircularMoveEstimate { radius, angle, radius_std, theta_std } => {
                self.handle_circular_move_estimate(*radius, *angle, *radius_std, *theta_std);
            }
            Payload::SonarReading { reading_m, std, constant_std, normal_std } => {
                self.handle_sonar_reading(*reading_m, *std, *constant_std, *normal_std);
            }
            _ => {}
        }
    }

    fn get_consumed(&self) -> Vec<MessageId> {
        vec![
            MessageId::SonarReading,
            MessageId::MoveEstimate,
            MessageId::TurnEstimate,
            MessageId::CircularMoveEstimate,
        ]
    }
}

/// Wraps [`MonteCarloEstimator`] for registration on the hub, which requires
/// `Rc<RefCell<dyn Consumer>>`.
pub fn into_consumer<R: Rng + 'static>(estimator: MonteCarloEstimator<R>) -> Rc<RefCell<MonteCarloEstimator<R>>> {
    Rc::new(RefCell::new(estimator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unit_square() -> Geofence {
        Geofence::new(&[0.0, 10.0, 10.0, 0.0, 0.0], &[0.0, 0.0, 10.0, 10.0, 0.0]).unwrap()
    }

    fn estimator(conf_toml: &str) -> MonteCarloEstimator<StdRng> {
        let scheduler = crate::scheduler::Scheduler::new();
        let hub = Hub::new(scheduler);
        let conf = Configuration::parse(conf_toml).unwrap();
        let rng = StdRng::seed_from_u64(42);
        MonteCarloEstimator::new(hub, &conf, unit_square(), rng).unwrap()
    }

    #[test]
    fn weights_sum_to_one_after_normalise() {
        let mut est = estimator(
            "[MCPositionEstimator]\nlocalisation = \"continuous\"\nstart_x = 5.0\nstart_y = 5.0\nstart_hed = 0.0\nnum_particles = 20\n",
        );
        for p in est.particles.iter_mut() {
            p.weight *= 3.7;
        }
        est.normalise_weights();
        let total: f64 = est.particles().iter().map(|p| p.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn resample_produces_exactly_n_particles_with_uniform_weight() {
        let mut est = estimator(
            "[MCPositionEstimator]\nlocalisation = \"continuous\"\nstart_x = 1.0\nstart_y = 1.0\nstart_hed = 0.0\nnum_particles = 15\n",
        );
        est.particles[0].weight = 10.0;
        est.normalise_weights();
        est.resample_particles();
        assert_eq!(est.particles().len(), 15);
        for p in est.particles() {
            assert!((p.weight - 1.0 / 15.0).abs() < 1e-12);
        }
    }

    #[test]
    fn weighted_mean_after_three_moves_at_a_fixed_heading() {
        // start_hed = 30 degrees, three zero-noise MoveEstimate(10/3, 0, 0)
        // deliveries: each leaves theta unchanged (theta_std = 0), so all
        // three accumulate 10m total distance at a constant pi/6 heading.
        let mut est = estimator(
            "[MCPositionEstimator]\nlocalisation = \"continuous\"\nstart_x = 0.0\nstart_y = 0.0\nstart_hed = 30.0\nnum_particles = 50\n",
        );
        for _ in 0..3 {
            est.handle_move_estimate(10.0 / 3.0, 0.0, 0.0);
        }
        let (x, y, theta) = est.estimate_position();
        assert!((x - 5.0).abs() < 0.01);
        assert!((y - 8.66).abs() < 0.01);
        assert!((theta - 0.52).abs() < 0.01);
    }
}
