use crate::config::PitchConfig;

// ---------------------------------------------------------------------------
// Guidance: gravity-turn pitch as a function of altitude
// ---------------------------------------------------------------------------

/// Pitch program: returns desired pitch angle (deg above the horizon).
/// - below `turn_start`: vertical ascent (90 deg)
/// - between: linear in the altitude fraction
/// - above `turn_end`: horizontal (0 deg)
pub fn target_pitch(altitude: f64, turn_start: f64, turn_end: f64) -> f64 {
    if altitude <= turn_start {
        return 90.0;
    }
    if altitude >= turn_end {
        return 0.0;
    }
    let frac = ((altitude - turn_start) / (turn_end - turn_start)).clamp(0.0, 1.0);
    (90.0 * (1.0 - frac)).clamp(0.0, 90.0)
}

/// Suppresses attitude commands that would not move the target by more than
/// the hysteresis band.
#[derive(Debug, Clone)]
pub struct PitchCommander {
    config: PitchConfig,
    last_issued: Option<f64>,
}

impl PitchCommander {
    pub fn new(config: PitchConfig) -> Self {
        Self { config, last_issued: None }
    }

    pub fn heading(&self) -> f64 {
        self.config.heading
    }

    pub fn last_issued(&self) -> Option<f64> {
        self.last_issued
    }

    /// Pitch to command at this altitude, or `None` when the last issued
    /// value is still good enough. Reaching 0 or 90 always gets commanded once.
    pub fn next_command(&self, altitude: f64) -> Option<f64> {
        let pitch = target_pitch(altitude, self.config.turn_start, self.config.turn_end);
        match self.last_issued {
            None => Some(pitch),
            Some(last) => {
                let moved = (pitch - last).abs() > self.config.hysteresis;
                let at_bound = (pitch == 0.0 || pitch == 90.0) && pitch != last;
                (moved || at_bound).then_some(pitch)
            }
        }
    }

    /// Record that the platform accepted `pitch`.
    pub fn confirm(&mut self, pitch: f64) {
        self.last_issued = Some(pitch);
    }
}
