use super::dynamics::{derivatives, Forces, PointState};
use crate::physics::Body;

// ---------------------------------------------------------------------------
// RK4 integrator with constant engine inputs over the step
// ---------------------------------------------------------------------------

pub fn rk4_step(state: &PointState, body: &Body, forces: &Forces, dt: f64) -> PointState {
    let k1 = derivatives(state, body, forces);
    let k2 = derivatives(&state.apply(&k1, dt * 0.5), body, forces);
    let k3 = derivatives(&state.apply(&k2, dt * 0.5), body, forces);
    let k4 = derivatives(&state.apply(&k3, dt), body, forces);

    PointState {
        pos: state.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        vel: state.vel + (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) * (dt / 6.0),
        mass: (state.mass + (k1.dmass + 2.0 * k2.dmass + 2.0 * k3.dmass + k4.dmass) * (dt / 6.0))
            .max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    #[test]
    fn circular_orbit_stays_circular() {
        let body = Body::kerbin();
        let r = body.radius + 100_000.0;
        let v = (body.mu / r).sqrt();
        let mut state = PointState { pos: Vector2::new(0.0, r), vel: Vector2::new(v, 0.0), mass: 1.0 };
        let coast = Forces::default();
        // a quarter of an orbit
        let period = std::f64::consts::TAU * (r.powi(3) / body.mu).sqrt();
        let steps = 2_000;
        let dt = period / 4.0 / steps as f64;
        for _ in 0..steps {
            state = rk4_step(&state, &body, &coast, dt);
        }
        assert!((state.pos.norm() - r).abs() < 1.0, "radius drift {}", state.pos.norm() - r);
        assert!(state.pos.x > r - 1.0, "should be a quarter turn downrange");
    }
}
