//! Closed-loop ascent and orbit-insertion guidance.
//!
//! The control core (`gnc`, `orbital`, `mission`) talks to a vehicle only
//! through [`platform::VesselPlatform`]; `sim` provides a simulated vehicle
//! behind the same boundary.

pub mod config;
pub mod error;
pub mod events;
pub mod gnc;
pub mod io;
pub mod mission;
pub mod orbital;
pub mod physics;
pub mod platform;
pub mod sim;
pub mod telemetry;
pub mod vehicle;
pub mod wait;

pub use config::MissionConfig;
pub use error::GuidanceError;
pub use mission::{MissionRunner, MissionSummary};
pub use platform::VesselPlatform;
pub use telemetry::{StageId, VehicleState};
