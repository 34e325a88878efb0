use std::f64::consts::{PI, TAU};

use nalgebra::Vector2;

/// Elements of a planar two-body orbit.
#[derive(Debug, Clone, Copy)]
pub struct PlanarElements {
    pub sma: f64,       // semi-major axis, m (infinite when unbound)
    pub ecc: f64,       // eccentricity (0 = circular)
    pub true_anom: f64, // true anomaly, rad in [0, 2pi)
    pub periapsis: f64, // radius, m
    pub apoapsis: f64,  // radius, m (infinite when unbound)
}

impl PlanarElements {
    /// Elements from a body-centred position and velocity.
    pub fn from_state_vector_mu(pos: &Vector2<f64>, vel: &Vector2<f64>, mu: f64) -> Self {
        let r = pos.norm();
        let v = vel.norm();

        // Specific angular momentum (z component)
        let h = pos.x * vel.y - pos.y * vel.x;

        // Eccentricity vector
        let e_vec = ((v * v - mu / r) * pos - pos.dot(vel) * vel) / mu;
        let ecc = e_vec.norm();

        let energy = 0.5 * v * v - mu / r;
        let (sma, apoapsis) = if energy < 0.0 {
            let a = -mu / (2.0 * energy);
            (a, a * (1.0 + ecc))
        } else {
            (f64::INFINITY, f64::INFINITY)
        };
        let periapsis = h * h / (mu * (1.0 + ecc));

        let true_anom = if ecc > 1e-10 {
            let cos_nu = (e_vec.dot(pos) / (ecc * r)).clamp(-1.0, 1.0);
            let nu = cos_nu.acos();
            // Falling back towards periapsis
            if pos.dot(vel) < 0.0 { TAU - nu } else { nu }
        } else {
            0.0
        };

        Self { sma, ecc, true_anom, periapsis, apoapsis }
    }

    pub fn is_bound(&self) -> bool {
        self.ecc < 1.0 && self.sma.is_finite()
    }

    pub fn period_mu(&self, mu: f64) -> f64 {
        TAU * (self.sma.powi(3) / mu).sqrt()
    }

    /// Seconds until the next apoapsis passage. Zero for a circular orbit,
    /// infinite for an unbound one.
    pub fn time_to_apoapsis(&self, mu: f64) -> f64 {
        if !self.is_bound() {
            return f64::INFINITY;
        }
        if self.ecc <= 1e-10 {
            return 0.0;
        }
        let e = self.ecc;
        let ecc_anom = 2.0 * (((1.0 - e) / (1.0 + e)).sqrt() * (self.true_anom / 2.0).tan()).atan();
        let mean_anom = ecc_anom - e * ecc_anom.sin();
        let mean_motion = (mu / self.sma.powi(3)).sqrt();
        (PI - mean_anom).rem_euclid(TAU) / mean_motion
    }
}
