use crate::config::GuardConfig;
use crate::error::GuidanceError;

// ---------------------------------------------------------------------------
// Advisory throttle table
// ---------------------------------------------------------------------------

/// Step throttle schedule against delta-v still to be gained (m/s).
/// Reported alongside each tick; the apoapsis guard is what ends the ascent.
pub fn advisory_throttle(dv_remaining: f64) -> f64 {
    if dv_remaining > 500.0 {
        1.0
    } else if dv_remaining > 200.0 {
        0.7
    } else if dv_remaining > 100.0 {
        0.4
    } else if dv_remaining > 50.0 {
        0.2
    } else if dv_remaining > 10.0 {
        0.1
    } else {
        0.05
    }
}

// ---------------------------------------------------------------------------
// Apoapsis guard
// ---------------------------------------------------------------------------

/// Hard cutoff on apoapsis overshoot. Latches on the first trip.
#[derive(Debug, Clone)]
pub struct ApoapsisGuard {
    target_altitude: f64,
    margin: f64,
    tripped: bool,
}

impl ApoapsisGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            target_altitude: config.target_altitude,
            margin: config.overshoot_margin,
            tripped: false,
        }
    }

    pub fn limit(&self) -> f64 {
        self.target_altitude * (1.0 + self.margin)
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Throttle the guard allows on top of `setpoint`: zero once tripped.
    pub fn allowed_throttle(&self, setpoint: f64) -> f64 {
        if self.tripped {
            0.0
        } else {
            setpoint
        }
    }

    /// `Err(ApoapsisOverrun)` exactly when `apoapsis > limit`, and on every
    /// call after that.
    pub fn check(&mut self, apoapsis: f64) -> Result<(), GuidanceError> {
        if self.tripped || apoapsis > self.limit() {
            self.tripped = true;
            return Err(GuidanceError::ApoapsisOverrun { apoapsis, limit: self.limit() });
        }
        Ok(())
    }
}
