//! End-to-end mission: launch, powered ascent, circularization.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, MissionConfig};
use crate::error::GuidanceError;
use crate::events::{AscentEnd, EventKind, EventLog};
use crate::gnc::{AscentController, TraceSample};
use crate::orbital::{ManeuverPlanner, PlannerPhase};
use crate::platform::{cut_throttle, VesselPlatform};
use crate::telemetry::StageId;

/// Final report of a completed mission.
#[derive(Debug, Clone, Serialize)]
pub struct MissionSummary {
    pub ascent_end: AscentEnd,
    pub ascent_dv: f64,          // m/s, tracked during powered ascent
    pub circularization_dv: f64, // m/s, planned node
    pub total_dv: f64,
    pub final_apoapsis: f64,  // m altitude
    pub final_periapsis: f64, // m altitude
    pub separations: Vec<StageId>,
    pub convergence_warnings: u32,
    pub convergence_retries: u32,
    pub mission_time: f64, // s of UT
}

#[derive(Debug)]
pub struct MissionRunner {
    config: MissionConfig,
    ascent: AscentController,
    planner: ManeuverPlanner,
    events: EventLog,
}

impl MissionRunner {
    /// Build a runner for `config`, which must pass [`MissionConfig::validate`].
    pub fn new(config: MissionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ascent: AscentController::new(&config),
            planner: ManeuverPlanner::new(&config),
            config,
            events: EventLog::new(),
        })
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn trace(&self) -> &[TraceSample] {
        self.ascent.trace()
    }

    pub fn planner_phase(&self) -> PlannerPhase {
        self.planner.phase()
    }

    /// Fly the whole mission. Whatever the outcome, an error return leaves the
    /// engine commanded to zero throttle.
    pub async fn run<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
    ) -> Result<MissionSummary, GuidanceError> {
        let result = self.fly(platform, cancel).await;
        if let Err(e) = &result {
            log::error!("mission aborted: {e}");
            cut_throttle(platform).await;
        }
        result
    }

    async fn fly<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
    ) -> Result<MissionSummary, GuidanceError> {
        let start_ut = platform.read_telemetry().await.map(|s| s.ut).unwrap_or(0.0);

        self.ascent.launch(platform, cancel, &mut self.events).await?;
        let ascent = self.ascent.run(platform, cancel, &mut self.events).await?;
        log::info!(
            "ascent over ({:?}): apo={:.1} km peri={:.1} km dv={:.0} m/s",
            ascent.end,
            ascent.final_state.apoapsis_altitude / 1000.0,
            ascent.final_state.periapsis_altitude / 1000.0,
            ascent.total_dv,
        );

        let max_retries = self.config.maneuver.convergence_retries;
        let mut retries = 0;
        let report = loop {
            match self.planner.run(platform, cancel, &mut self.events).await {
                Ok(report) => break report,
                Err(GuidanceError::ManeuverConvergenceTimeout { phase, waited })
                    if retries < max_retries =>
                {
                    retries += 1;
                    log::warn!(
                        "{phase} not converged after {waited:.1} s, retry {retries}/{max_retries}"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        let circularization_dv = report.plan.map_or(0.0, |p| p.prograde_dv);
        let total_dv = ascent.total_dv + circularization_dv;
        let fin = &report.final_state;
        self.events.record(
            fin.ut,
            EventKind::MissionComplete {
                total_dv,
                apoapsis: fin.apoapsis_altitude,
                periapsis: fin.periapsis_altitude,
            },
        );

        Ok(MissionSummary {
            ascent_end: ascent.end,
            ascent_dv: ascent.total_dv,
            circularization_dv,
            total_dv,
            final_apoapsis: fin.apoapsis_altitude,
            final_periapsis: fin.periapsis_altitude,
            separations: self.events.separations(),
            convergence_warnings: report.warnings,
            convergence_retries: retries,
            mission_time: fin.ut - start_ut,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageProfile;
    use crate::platform::mock::{Command, RecordingPlatform};
    use crate::telemetry::VehicleState;

    const MU: f64 = 3.5316e12;
    const BODY: f64 = 600_000.0;

    /// Above the atmosphere with the apoapsis past the guard limit. The
    /// reported speed already equals the circular target so trim settles at once.
    fn high_coast() -> VehicleState {
        let r = BODY + 170_000.0;
        VehicleState {
            ut: 200.0,
            altitude: 80_000.0,
            apoapsis_altitude: 170_000.0,
            periapsis_altitude: -150_000.0,
            time_to_apoapsis: 90.0,
            horizontal_speed: (MU / r).sqrt(),
            available_thrust: 60_000.0,
            specific_impulse: 345.0,
            mass: 3_000.0,
            semi_major_axis: 0.8 * r,
            mu: MU,
            body_radius: BODY,
            ..Default::default()
        }
    }

    fn single_stage() -> MissionConfig {
        let mut config = MissionConfig::default();
        config.control.countdown = 0;
        config.staging.stages = vec![StageProfile::new(5, "Only").passive()];
        config
    }

    #[tokio::test(start_paused = true)]
    async fn guard_trip_flows_into_circularization() {
        let mut p = RecordingPlatform::new();
        p.push_state(high_coast());
        p.set_attitude_error(0.0);
        let cancel = CancellationToken::new();

        let mut runner = MissionRunner::new(single_stage()).unwrap();
        let summary = runner.run(&mut p, &cancel).await.unwrap();

        assert_eq!(summary.ascent_end, AscentEnd::GuardTrip);
        assert!(summary.circularization_dv > 0.0);
        assert_eq!(runner.planner_phase(), PlannerPhase::Done);
        assert!(matches!(
            runner.events().kinds().last(),
            Some(EventKind::MissionComplete { .. })
        ));
        assert!(matches!(runner.events().kinds().next(), Some(EventKind::Liftoff)));
        assert_eq!(p.last_throttle(), Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn convergence_timeouts_are_retried() {
        let mut config = single_stage();
        config.maneuver.orient_timeout = 2.0;
        config.maneuver.convergence_retries = 1;
        let mut p = RecordingPlatform::new();
        p.push_state(high_coast());
        p.set_attitude_error(10.0);
        let cancel = CancellationToken::new();

        let mut runner = MissionRunner::new(config).unwrap();
        let err = runner.run(&mut p, &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            GuidanceError::ManeuverConvergenceTimeout { phase: PlannerPhase::Orient, .. }
        ));
        let warnings = runner
            .events()
            .kinds()
            .filter(|k| matches!(k, EventKind::ConvergenceWarning { .. }))
            .count();
        assert_eq!(warnings, 2);
        assert_eq!(p.count(|c| matches!(c, Command::CreateManeuver { .. })), 1);
        assert_eq!(p.last_throttle(), Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_countdown() {
        let mut config = MissionConfig::default();
        config.control.countdown = 10;
        let mut p = RecordingPlatform::new();
        p.push_state(VehicleState::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let mut runner = MissionRunner::new(config).unwrap();
        let err = runner.run(&mut p, &cancel).await.unwrap_err();
        assert!(matches!(err, GuidanceError::Cancelled));
        assert_eq!(p.count(|c| *c == Command::ActivateStage), 0);
        assert_eq!(p.last_throttle(), Some(0.0));
    }

    #[test]
    fn runner_refuses_invalid_config() {
        let mut config = single_stage();
        config.control.tick = f64::INFINITY;
        let err = MissionRunner::new(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
