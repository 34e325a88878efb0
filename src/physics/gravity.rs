use nalgebra::Vector2;

use super::atmosphere::Atmosphere;

pub const MU_KERBIN: f64 = 3.5316e12; // m^3/s^2
pub const R_KERBIN: f64 = 600_000.0;  // m

/// Central body: point-mass gravity plus an atmosphere.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub mu: f64,     // m^3/s^2
    pub radius: f64, // m
    pub atmosphere: Atmosphere,
}

impl Body {
    pub fn kerbin() -> Self {
        Self { mu: MU_KERBIN, radius: R_KERBIN, atmosphere: Atmosphere::kerbin() }
    }

    pub fn surface_gravity(&self) -> f64 {
        self.mu / (self.radius * self.radius)
    }

    pub fn altitude(&self, pos: &Vector2<f64>) -> f64 {
        pos.norm() - self.radius
    }
}

/// Inverse-square gravity acceleration towards the body centre.
pub fn gravity_accel(pos: &Vector2<f64>, mu: f64) -> Vector2<f64> {
    let r = pos.norm();
    if r < 1.0 {
        return Vector2::zeros();
    }
    -mu / (r * r * r) * pos
}
