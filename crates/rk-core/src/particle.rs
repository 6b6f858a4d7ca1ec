//! Particle-filter pose hypotheses. Ported from
//! `original_source/src/mcEstimator.py`'s `Particle` / `NormalParticle`.

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// A pose hypothesis `(x, y, theta)` with a scalar weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub weight: f64,
}

impl Particle {
    pub fn new(x: f64, y: f64, theta: f64, weight: f64) -> Self {
        Self { x, y, theta, weight }
    }
}

/// A particle whose motion update draws from a normal distribution around
/// the commanded distance and heading change — spec.md §4.7 "Motion update".
pub type NormalParticle = Particle;

/// Apply a noisy straight-line move: `theta' = theta + N(0, theta_std)`,
/// `d' = N(distance, distance_std)`, then `x += sin(theta') * d'`,
/// `y += cos(theta') * d'`.
pub fn move_std<R: Rng + ?Sized>(
    particle: &mut Particle,
    distance: f64,
    distance_std: f64,
    theta_std: f64,
    rng: &mut R,
) {
    let dtheta = if theta_std > 0.0 {
        Normal::new(0.0, theta_std).unwrap().sample(rng)
    } else {
        0.0
    };
    particle.theta += dtheta;

    let d = if distance_std > 0.0 {
        Normal::new(distance, distance_std).unwrap().sample(rng)
    } else {
        distance
    };
    particle.x += particle.theta.sin() * d;
    particle.y += particle.theta.cos() * d;
}

/// Apply a noisy pure rotation: `theta' = theta + N(dtheta, theta_std)`.
pub fn turn_std<R: Rng + ?Sized>(particle: &mut Particle, dtheta: f64, theta_std: f64, rng: &mut R) {
    let noisy_dtheta = if theta_std > 0.0 {
        Normal::new(dtheta, theta_std).unwrap().sample(rng)
    } else {
        dtheta
    };
    particle.theta += noisy_dtheta;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_std_zero_noise_is_deterministic() {
        let mut p = Particle::new(0.0, 0.0, 0.0, 1.0);
        let mut rng = rand::rng();
        move_std(&mut p, 1.0, 0.0, 0.0, &mut rng);
        assert!((p.x - 0.0).abs() < 1e-9);
        assert!((p.y - 1.0).abs() < 1e-9);
    }
}
