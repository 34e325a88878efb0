use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GuidanceError;
use crate::platform::VesselPlatform;

/// Staging-sequence number of a physical stage (decouple stage).
///
/// Stages are consumed in descending order, so the active id never increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub u32);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Vehicle state snapshot
// ---------------------------------------------------------------------------

/// Read-only view of the vehicle for one control tick.
/// Distances in m, speeds in m/s, time in s of universal time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VehicleState {
    pub ut: f64,
    pub altitude: f64,
    pub apoapsis_altitude: f64,
    pub periapsis_altitude: f64,
    pub time_to_apoapsis: f64,
    pub vertical_speed: f64,
    pub horizontal_speed: f64,
    pub available_thrust: f64, // N at full throttle
    pub specific_impulse: f64, // s
    pub mass: f64,             // kg
    pub semi_major_axis: f64,
    pub mu: f64,          // m^3/s^2
    pub body_radius: f64, // m
    /// Limiting propellant amount per watched stage.
    pub propellant: BTreeMap<StageId, f64>,
}

impl VehicleState {
    pub fn speed(&self) -> f64 {
        self.vertical_speed.hypot(self.horizontal_speed)
    }

    pub fn apoapsis_radius(&self) -> f64 {
        self.apoapsis_altitude + self.body_radius
    }

    pub fn propellant(&self, stage: StageId) -> Option<f64> {
        self.propellant.get(&stage).copied()
    }
}

/// Capture one consistent snapshot: telemetry first, then the limiting
/// propellant (minimum over `resources`) of each watched stage.
pub async fn capture<P: VesselPlatform + ?Sized>(
    platform: &mut P,
    watch: &[StageId],
    resources: &[String],
) -> Result<VehicleState, GuidanceError> {
    let mut state = platform.read_telemetry().await?;
    for &stage in watch {
        let mut limiting = f64::INFINITY;
        for name in resources {
            let amount = platform.resources_remaining(stage, name).await?;
            limiting = limiting.min(amount);
        }
        if limiting.is_finite() {
            state.propellant.insert(stage, limiting);
        }
    }
    Ok(state)
}
