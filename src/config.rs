//! Mission configuration: guidance constants, staging profiles and planner timeouts.
//!
//! Every field has a default matching the reference three-stage Kerbin ascent, so an
//! empty TOML document is a valid mission.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::StageId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub pitch: PitchConfig,
    pub guard: GuardConfig,
    pub staging: StagingConfig,
    pub throttle: ThrottleConfig,
    pub control: ControlConfig,
    pub maneuver: ManeuverConfig,
}

impl MissionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: MissionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pitch;
        if !(p.turn_start.is_finite() && p.turn_end.is_finite() && p.heading.is_finite()) {
            return invalid("pitch program values must be finite");
        }
        if !(p.turn_start < p.turn_end) {
            return invalid(format!(
                "turn_start ({}) must be below turn_end ({})",
                p.turn_start, p.turn_end
            ));
        }

        let stages = &self.staging.stages;
        if stages.is_empty() {
            return invalid("at least one stage profile is required");
        }
        for pair in stages.windows(2) {
            if pair[1].id >= pair[0].id {
                return invalid(format!(
                    "stage ids must be strictly descending ({} then {})",
                    pair[0].id, pair[1].id
                ));
            }
        }
        for stage in stages {
            if let Some(t) = stage.post_separation_throttle {
                check_fraction(t, "post_separation_throttle")?;
            }
            if stage.separation_commands == 0 {
                return invalid(format!("stage {} needs at least one separation command", stage.id));
            }
        }
        if self.staging.resources.is_empty() {
            return invalid("staging needs at least one propellant resource name");
        }

        check_fraction(self.control.launch_throttle, "launch_throttle")?;
        check_fraction(self.maneuver.trim_throttle, "trim_throttle")?;

        let positive = [
            (self.guard.target_altitude, "guard.target_altitude"),
            (self.guard.overshoot_margin, "guard.overshoot_margin"),
            (self.control.tick, "control.tick"),
            (self.control.max_ascent_duration, "control.max_ascent_duration"),
            (self.maneuver.coast_timeout, "maneuver.coast_timeout"),
            (self.maneuver.orient_timeout, "maneuver.orient_timeout"),
            (self.maneuver.warp_timeout, "maneuver.warp_timeout"),
            (self.maneuver.trim_timeout, "maneuver.trim_timeout"),
            (self.maneuver.command_timeout, "maneuver.command_timeout"),
            (self.maneuver.trim_tolerance, "maneuver.trim_tolerance"),
        ];
        for (value, name) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return invalid(format!("{name} must be positive and finite, got {value}"));
            }
        }

        let non_negative = [
            (self.pitch.hysteresis, "pitch.hysteresis"),
            (self.staging.propellant_threshold, "staging.propellant_threshold"),
            (self.staging.settle_delay, "staging.settle_delay"),
            (self.throttle.ascent_delta_v_budget, "throttle.ascent_delta_v_budget"),
            (self.control.status_interval, "control.status_interval"),
            (self.maneuver.coast_altitude, "maneuver.coast_altitude"),
            (self.maneuver.attitude_tolerance, "maneuver.attitude_tolerance"),
            (self.maneuver.warp_lead_time, "maneuver.warp_lead_time"),
            (self.maneuver.warp_tolerance, "maneuver.warp_tolerance"),
            (self.maneuver.trim_reserve, "maneuver.trim_reserve"),
            (self.maneuver.trim_gain, "maneuver.trim_gain"),
        ];
        for (value, name) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return invalid(format!("{name} must be non-negative and finite, got {value}"));
            }
        }
        for stage in stages {
            if let Some(ceiling) = stage.altitude_ceiling {
                if !ceiling.is_finite() {
                    return invalid(format!("stage {} altitude_ceiling must be finite", stage.id));
                }
            }
        }
        Ok(())
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}

fn check_fraction(value: f64, name: &str) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        invalid(format!("{name} must lie in [0, 1], got {value}"))
    }
}

/// Seconds from config to a `Duration`. Negative values clamp to zero and
/// anything too large for a `Duration` saturates.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub turn_start: f64, // m
    pub turn_end: f64,   // m
    pub heading: f64,    // deg
    pub hysteresis: f64, // deg
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self { turn_start: 250.0, turn_end: 45_000.0, heading: 90.0, hysteresis: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub target_altitude: f64,  // m
    pub overshoot_margin: f64, // fraction
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { target_altitude: 150_000.0, overshoot_margin: 0.1 }
    }
}

/// One physical stage as the staging machine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProfile {
    pub id: StageId,
    pub name: String,
    /// Separate when the limiting propellant drops below the threshold.
    #[serde(default = "default_true")]
    pub propellant_cutoff: bool,
    /// Backup trigger for stages without a reliable propellant signal.
    #[serde(default)]
    pub altitude_ceiling: Option<f64>,
    #[serde(default)]
    pub post_separation_throttle: Option<f64>,
    /// Staging activations needed to drop this stage and light the next one.
    #[serde(default = "default_separation_commands")]
    pub separation_commands: u32,
}

fn default_true() -> bool {
    true
}

fn default_separation_commands() -> u32 {
    2
}

impl StageProfile {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: StageId(id),
            name: name.into(),
            propellant_cutoff: true,
            altitude_ceiling: None,
            post_separation_throttle: None,
            separation_commands: 2,
        }
    }

    pub fn ceiling(mut self, altitude: f64) -> Self {
        self.altitude_ceiling = Some(altitude);
        self
    }

    pub fn then_throttle(mut self, throttle: f64) -> Self {
        self.post_separation_throttle = Some(throttle);
        self
    }

    /// Stage that is flown but never separated by the ascent loop.
    pub fn passive(mut self) -> Self {
        self.propellant_cutoff = false;
        self.altitude_ceiling = None;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub propellant_threshold: f64,
    pub resources: Vec<String>,
    pub settle_delay: f64, // s
    pub stages: Vec<StageProfile>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            propellant_threshold: 0.1,
            resources: vec!["LiquidFuel".into(), "Oxidizer".into()],
            settle_delay: 0.5,
            stages: vec![
                StageProfile::new(9, "Booster"),
                StageProfile::new(7, "Sustainer").ceiling(69_000.0).then_throttle(0.7),
                StageProfile::new(5, "Upper").passive(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub ascent_delta_v_budget: f64, // m/s
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { ascent_delta_v_budget: 3_400.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub tick: f64,            // s
    pub status_interval: f64, // s of mission time
    pub countdown: u32,       // s
    pub max_ascent_duration: f64,
    pub launch_throttle: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick: 0.1,
            status_interval: 10.0,
            countdown: 3,
            max_ascent_duration: 900.0,
            launch_throttle: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManeuverConfig {
    pub coast_altitude: f64, // m
    pub coast_timeout: f64,  // s
    pub release_commands: u32,
    pub attitude_tolerance: f64, // deg
    pub orient_timeout: f64,
    pub warp_lead_time: f64,
    pub warp_tolerance: f64,
    pub warp_timeout: f64,
    pub trim_reserve: f64,
    pub trim_throttle: f64,
    pub trim_gain: f64, // throttle per m/s of remaining delta-v
    pub trim_tolerance: f64, // m/s
    pub trim_timeout: f64,
    /// How long a refused actuation command is retried before the phase stalls.
    pub command_timeout: f64, // s
    pub convergence_retries: u32,
    pub proceed_on_timeout: bool,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            coast_altitude: 70_500.0,
            coast_timeout: 900.0,
            release_commands: 2,
            attitude_tolerance: 1.0,
            orient_timeout: 40.0,
            warp_lead_time: 5.0,
            warp_tolerance: 1.0,
            warp_timeout: 30.0,
            trim_reserve: 0.5,
            trim_throttle: 0.05,
            trim_gain: 0.01,
            trim_tolerance: 0.1,
            trim_timeout: 30.0,
            command_timeout: 10.0,
            convergence_retries: 2,
            proceed_on_timeout: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = MissionConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.staging.stages.len(), 3);
        assert_eq!(cfg.staging.stages[1].altitude_ceiling, Some(69_000.0));
        assert_eq!(cfg.maneuver.coast_altitude, 70_500.0);
    }

    #[test]
    fn partial_override() {
        let cfg = MissionConfig::from_toml_str(
            r#"
            [guard]
            target_altitude = 80000.0

            [[staging.stages]]
            id = 3
            name = "Only"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.guard.target_altitude, 80_000.0);
        assert!((cfg.guard.overshoot_margin - 0.1).abs() < 1e-12);
        assert_eq!(cfg.staging.stages.len(), 1);
        assert!(cfg.staging.stages[0].propellant_cutoff);
        assert_eq!(cfg.staging.stages[0].separation_commands, 2);
    }

    #[test]
    fn rejects_inverted_turn() {
        let err = MissionConfig::from_toml_str("[pitch]\nturn_start = 5000.0\nturn_end = 100.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_ascending_stage_ids() {
        let mut cfg = MissionConfig::default();
        cfg.staging.stages = vec![StageProfile::new(3, "A"), StageProfile::new(5, "B")];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_margin() {
        let mut cfg = MissionConfig::default();
        cfg.guard.overshoot_margin = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_infinite_tick() {
        let err = MissionConfig::from_toml_str("[control]\ntick = inf\n").unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("control.tick"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_negative_and_unbounded_delays() {
        let mut cfg = MissionConfig::default();
        cfg.staging.settle_delay = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = MissionConfig::default();
        cfg.maneuver.warp_lead_time = f64::INFINITY;
        assert!(cfg.validate().is_err());

        let mut cfg = MissionConfig::default();
        cfg.maneuver.command_timeout = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = MissionConfig::default();
        cfg.staging.stages[1].altitude_ceiling = Some(f64::INFINITY);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn secs_saturates_instead_of_panicking() {
        assert_eq!(secs(f64::INFINITY), Duration::MAX);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(-3.0), Duration::ZERO);
        assert_eq!(secs(1.5), Duration::from_millis(1500));
    }
}
