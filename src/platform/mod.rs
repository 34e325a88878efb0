//! Capability boundary to the vehicle: telemetry in, actuation out.

pub mod mock;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GuidanceError;
use crate::telemetry::{StageId, VehicleState};

/// Opaque reference to a maneuver node owned by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ManeuverHandle(pub u64);

/// Everything the controller needs from a vehicle.
///
/// Implementations report transient link problems as
/// [`GuidanceError::TelemetryUnavailable`] and refused commands as
/// [`GuidanceError::ActuationRejected`].
#[async_trait]
pub trait VesselPlatform: Send {
    async fn read_telemetry(&mut self) -> Result<VehicleState, GuidanceError>;

    async fn resources_remaining(
        &mut self,
        stage: StageId,
        resource: &str,
    ) -> Result<f64, GuidanceError>;

    async fn set_throttle(&mut self, fraction: f64) -> Result<(), GuidanceError>;

    /// Attitude target for the autopilot; pitch from the local horizon, heading from north.
    async fn set_attitude(&mut self, pitch_deg: f64, heading_deg: f64) -> Result<(), GuidanceError>;

    /// Angle between current pointing and the autopilot target, in degrees.
    async fn attitude_error(&mut self) -> Result<f64, GuidanceError>;

    async fn engage_autopilot(&mut self) -> Result<(), GuidanceError>;

    async fn disengage_autopilot(&mut self) -> Result<(), GuidanceError>;

    /// Fire the next staging actuation (decoupler or engine ignition).
    async fn activate_next_stage(&mut self) -> Result<(), GuidanceError>;

    async fn create_maneuver(
        &mut self,
        epoch: f64,
        prograde_dv: f64,
    ) -> Result<ManeuverHandle, GuidanceError>;

    async fn remove_maneuver(&mut self, handle: ManeuverHandle) -> Result<(), GuidanceError>;

    async fn remaining_delta_v(&mut self, handle: ManeuverHandle) -> Result<f64, GuidanceError>;

    async fn request_time_acceleration(&mut self, target_epoch: f64) -> Result<(), GuidanceError>;
}

/// Best-effort engine cutoff used on every unwinding path. Never cancellable.
pub async fn cut_throttle<P: VesselPlatform + ?Sized>(platform: &mut P) {
    for attempt in 1..=3 {
        match platform.set_throttle(0.0).await {
            Ok(()) => return,
            Err(e) => log::error!("throttle cutoff attempt {attempt} failed: {e}"),
        }
    }
}
