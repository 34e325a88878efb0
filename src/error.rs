use thiserror::Error;

use crate::orbital::planner::PlannerPhase;

/// Everything that can go wrong between the controller and the vehicle.
///
/// Only [`GuidanceError::TelemetryUnavailable`] and [`GuidanceError::ActuationRejected`]
/// are transient; the control loop retries them on the next tick.
#[derive(Debug, Error)]
pub enum GuidanceError {
    #[error("telemetry unavailable: {0}")]
    TelemetryUnavailable(String),
    #[error("platform rejected {command}: {reason}")]
    ActuationRejected { command: &'static str, reason: String },
    #[error("apoapsis {apoapsis:.0} m overran limit {limit:.0} m")]
    ApoapsisOverrun { apoapsis: f64, limit: f64 },
    #[error("{phase} did not converge within {waited:.1} s")]
    ManeuverConvergenceTimeout { phase: PlannerPhase, waited: f64 },
    #[error("maneuver infeasible: {0}")]
    ManeuverInfeasible(String),
    #[error("ascent did not terminate within {0:.0} s")]
    AscentTimeout(f64),
    #[error("mission cancelled")]
    Cancelled,
}

impl GuidanceError {
    pub fn rejected(command: &'static str, reason: impl Into<String>) -> Self {
        GuidanceError::ActuationRejected { command, reason: reason.into() }
    }

    /// Transient errors leave controller state untouched and are retried next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GuidanceError::TelemetryUnavailable(_) | GuidanceError::ActuationRejected { .. }
        )
    }
}
