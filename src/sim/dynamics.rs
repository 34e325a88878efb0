use nalgebra::Vector2;

use crate::physics::aerodynamics::drag_force;
use crate::physics::gravity::gravity_accel;
use crate::physics::Body;

/// Point-mass state in the body-centred, non-rotating plane.
#[derive(Debug, Clone, Copy)]
pub struct PointState {
    pub pos: Vector2<f64>, // m
    pub vel: Vector2<f64>, // m/s
    pub mass: f64,         // kg
}

#[derive(Debug, Clone, Copy)]
pub struct Deriv {
    pub dpos: Vector2<f64>,
    pub dvel: Vector2<f64>,
    pub dmass: f64,
}

impl PointState {
    pub fn apply(&self, d: &Deriv, dt: f64) -> Self {
        Self {
            pos: self.pos + d.dpos * dt,
            vel: self.vel + d.dvel * dt,
            mass: self.mass + d.dmass * dt,
        }
    }

    /// Local vertical.
    pub fn up(&self) -> Vector2<f64> {
        self.pos.normalize()
    }

    /// Local horizontal in the direction of launch.
    pub fn downrange(&self) -> Vector2<f64> {
        let up = self.up();
        Vector2::new(up.y, -up.x)
    }
}

/// Engine and airframe inputs, held constant over one integration step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forces {
    pub thrust: f64,    // N
    pub pitch: f64,     // rad above the local horizon
    pub mass_flow: f64, // kg/s
    pub cd_area: f64,   // m^2
}

// ---------------------------------------------------------------------------
// Equations of motion (planar point mass)
// ---------------------------------------------------------------------------

/// Forces modeled:
///   1. Gravity: inverse-square, towards the body centre
///   2. Thrust: along the commanded pitch in the local frame
///   3. Drag: quadratic, opposing velocity, exponential atmosphere
pub fn derivatives(state: &PointState, body: &Body, forces: &Forces) -> Deriv {
    let mass = state.mass.max(1e-6);
    let a_gravity = gravity_accel(&state.pos, body.mu);

    let a_thrust = if forces.thrust > 0.0 {
        let dir = state.downrange() * forces.pitch.cos() + state.up() * forces.pitch.sin();
        dir * (forces.thrust / mass)
    } else {
        Vector2::zeros()
    };

    let density = body.atmosphere.density(body.altitude(&state.pos));
    let a_drag = drag_force(&state.vel, density, 1.0, forces.cd_area) / mass;

    Deriv {
        dpos: state.vel,
        dvel: a_gravity + a_thrust + a_drag,
        dmass: -forces.mass_flow,
    }
}
