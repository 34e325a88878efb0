use serde::Serialize;

use crate::error::GuidanceError;

pub const G0: f64 = 9.80665; // standard gravity, m/s^2

/// Finite-burn estimate from the Tsiolkovsky rocket equation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BurnEstimate {
    pub exhaust_velocity: f64, // m/s, Isp * g0
    pub initial_mass: f64,     // kg
    pub final_mass: f64,       // kg
    pub mass_flow: f64,        // kg/s at full thrust
    pub duration: f64,         // s
}

/// Full-thrust burn time for `delta_v` (sign ignored):
/// `m1 = m0 / exp(dv / (Isp g0))`, `mdot = F / (Isp g0)`, `t = (m0 - m1) / mdot`.
pub fn estimate_burn(
    delta_v: f64,
    thrust: f64,
    isp: f64,
    initial_mass: f64,
) -> Result<BurnEstimate, GuidanceError> {
    if !(thrust > 0.0) {
        return Err(GuidanceError::ManeuverInfeasible(format!("no thrust available ({thrust} N)")));
    }
    if !(isp > 0.0) || !(initial_mass > 0.0) {
        return Err(GuidanceError::ManeuverInfeasible(format!(
            "invalid engine or mass (isp={isp} s, m0={initial_mass} kg)"
        )));
    }
    let exhaust_velocity = isp * G0;
    let final_mass = initial_mass / (delta_v.abs() / exhaust_velocity).exp();
    let mass_flow = thrust / exhaust_velocity;
    Ok(BurnEstimate {
        exhaust_velocity,
        initial_mass,
        final_mass,
        mass_flow,
        duration: (initial_mass - final_mass) / mass_flow,
    })
}
