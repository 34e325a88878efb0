use crate::telemetry::VehicleState;

// ---------------------------------------------------------------------------
// Delta-v bookkeeping
// ---------------------------------------------------------------------------

/// Cheap consumed-delta-v estimate from successive speed samples.
///
/// The mission total accumulates the absolute speed change between updates,
/// so it never decreases. The stage figure is the signed speed gained since
/// the last separation. Neither is a propellant budget.
#[derive(Debug, Clone)]
pub struct DeltaVTracker {
    total_dv_used: f64,
    stage_dv_used: f64,
    start_speed: f64,
    stage_start_speed: f64,
    last_speed: f64,
    last_update: f64, // ut
}

impl DeltaVTracker {
    pub fn new(initial: &VehicleState) -> Self {
        let speed = initial.speed();
        Self {
            total_dv_used: 0.0,
            stage_dv_used: 0.0,
            start_speed: speed,
            stage_start_speed: speed,
            last_speed: speed,
            last_update: initial.ut,
        }
    }

    /// Fold in a new sample; returns `(total_dv, stage_dv)`.
    pub fn update(&mut self, state: &VehicleState) -> (f64, f64) {
        let speed = state.speed();
        self.total_dv_used += (speed - self.last_speed).abs();
        self.stage_dv_used = speed - self.stage_start_speed;
        self.last_speed = speed;
        self.last_update = state.ut;
        (self.total_dv_used, self.stage_dv_used)
    }

    /// Re-baseline the stage counter; once per separation.
    pub fn reset_stage(&mut self, state: &VehicleState) {
        self.stage_start_speed = state.speed();
        self.stage_dv_used = 0.0;
    }

    pub fn total_dv(&self) -> f64 {
        self.total_dv_used
    }

    pub fn stage_dv(&self) -> f64 {
        self.stage_dv_used
    }

    /// Net speed change since the tracker was created.
    pub fn net_speed_gain(&self) -> f64 {
        self.last_speed - self.start_speed
    }

    pub fn last_update(&self) -> f64 {
        self.last_update
    }
}
