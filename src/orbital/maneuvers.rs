use serde::Serialize;

use crate::error::GuidanceError;

/// Orbital speed at radius `r` on an orbit of semi-major axis `a` (vis-viva).
/// `None` when the radius is not reachable on that orbit.
pub fn vis_viva_speed(mu: f64, r: f64, a: f64) -> Option<f64> {
    let v2 = mu * (2.0 / r - 1.0 / a);
    (v2 >= 0.0 && v2.is_finite()).then(|| v2.sqrt())
}

/// Calculate circular orbit velocity at a given radius.
pub fn circular_velocity_mu(r: f64, mu: f64) -> f64 {
    (mu / r).sqrt()
}

/// Prograde burn that turns the current orbit circular at its apoapsis.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CircularizationBurn {
    pub radius: f64,        // m, apoapsis radius
    pub current_speed: f64, // m/s at apoapsis on the current orbit
    pub target_speed: f64,  // m/s, circular speed at `radius`
    pub delta_v: f64,       // m/s, positive = prograde
}

/// Size the circularization burn with vis-viva:
/// `v1 = sqrt(mu (2/r - 1/a))`, `v2 = sqrt(mu / r)`, `dv = v2 - v1`.
pub fn circularize_at_apoapsis(
    mu: f64,
    apoapsis_radius: f64,
    semi_major_axis: f64,
) -> Result<CircularizationBurn, GuidanceError> {
    if !(mu > 0.0) || !(apoapsis_radius > 0.0) {
        return Err(GuidanceError::ManeuverInfeasible(format!(
            "need positive mu and radius, got mu={mu} r={apoapsis_radius}"
        )));
    }
    // An escape trajectory reports an infinite apoapsis and semi-major axis.
    if !mu.is_finite() || !apoapsis_radius.is_finite() || !semi_major_axis.is_finite() {
        return Err(GuidanceError::ManeuverInfeasible(format!(
            "orbit is not closed (r={apoapsis_radius}, a={semi_major_axis})"
        )));
    }
    let current_speed = vis_viva_speed(mu, apoapsis_radius, semi_major_axis).ok_or_else(|| {
        GuidanceError::ManeuverInfeasible(format!(
            "radius {apoapsis_radius:.0} m is not on an orbit with a={semi_major_axis:.0} m"
        ))
    })?;
    let target_speed = circular_velocity_mu(apoapsis_radius, mu);
    Ok(CircularizationBurn {
        radius: apoapsis_radius,
        current_speed,
        target_speed,
        delta_v: target_speed - current_speed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MU_KERBIN: f64 = 3.5316e12;

    #[test]
    fn already_circular_needs_nothing() {
        let r = 600_000.0 + 150_000.0;
        let burn = circularize_at_apoapsis(MU_KERBIN, r, r).unwrap();
        assert!(burn.delta_v.abs() < 1e-9, "dv = {}", burn.delta_v);
    }

    #[test]
    fn elliptic_orbit_matches_vis_viva() {
        let r = 1.5e5 + 6.0e5;
        let a = 0.9 * r;
        let burn = circularize_at_apoapsis(MU_KERBIN, r, a).unwrap();
        let v1 = (MU_KERBIN * (2.0 / r - 1.0 / a)).sqrt();
        let v2 = (MU_KERBIN / r).sqrt();
        assert_relative_eq!(burn.current_speed, v1, max_relative = 1e-12);
        assert_relative_eq!(burn.target_speed, v2, max_relative = 1e-12);
        assert_relative_eq!(burn.delta_v, v2 - v1, max_relative = 1e-12);
        // ~2046 m/s -> ~2170 m/s
        assert!(burn.delta_v > 120.0 && burn.delta_v < 130.0, "dv = {}", burn.delta_v);
    }

    #[test]
    fn unreachable_radius_is_infeasible() {
        // r beyond 2a has no real speed
        let err = circularize_at_apoapsis(MU_KERBIN, 2_000_000.0, 900_000.0).unwrap_err();
        assert!(matches!(err, GuidanceError::ManeuverInfeasible(_)));
    }

    #[test]
    fn open_orbit_is_infeasible() {
        let r = 600_000.0 + 150_000.0;
        for (radius, a) in [(f64::INFINITY, f64::INFINITY), (r, f64::INFINITY), (f64::NAN, r)] {
            let err = circularize_at_apoapsis(MU_KERBIN, radius, a).unwrap_err();
            assert!(matches!(err, GuidanceError::ManeuverInfeasible(_)), "r={radius} a={a}");
        }
    }

    #[test]
    fn circular_speed_leo() {
        let v = circular_velocity_mu(6_778_137.0, 3.986_004_418e14);
        assert!((v - 7668.6).abs() < 1.0, "got {v}");
    }
}
