use nalgebra::Vector2;

/// Aerodynamic drag force opposing the airspeed vector.
pub fn drag_force(vel: &Vector2<f64>, density: f64, cd: f64, area: f64) -> Vector2<f64> {
    let speed = vel.norm();
    if speed > 1e-6 && density > 0.0 {
        let q_dyn = 0.5 * density * speed * speed;
        -vel / speed * (q_dyn * cd * area)
    } else {
        Vector2::zeros()
    }
}
