pub mod dynamics;
pub mod integrator;
pub mod vehicle;

pub use integrator::rk4_step;
pub use vehicle::{SimConfig, SimVehicle};
