use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::delta_v::DeltaVTracker;
use super::guidance::PitchCommander;
use super::staging::{SeparationOrder, StagingDecision, StagingMachine};
use super::throttle::{advisory_throttle, ApoapsisGuard};
use crate::config::{secs, ControlConfig, MissionConfig};
use crate::error::GuidanceError;
use crate::events::{AscentEnd, EventKind, EventLog};
use crate::platform::{cut_throttle, VesselPlatform};
use crate::telemetry::{self, StageId, VehicleState};
use crate::wait::{self, Deadline};

/// One row of the ascent flight trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceSample {
    pub ut: f64,
    pub altitude: f64,
    pub apoapsis: f64,
    pub periapsis: f64,
    pub speed: f64,
    pub stage: Option<StageId>,
    pub throttle: f64,
    pub advisory_throttle: f64,
    pub pitch: Option<f64>,
    pub total_dv: f64,
    pub stage_dv: f64,
}

#[derive(Debug, Clone)]
pub struct AscentOutcome {
    pub end: AscentEnd,
    pub total_dv: f64,
    pub final_state: VehicleState,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Continue,
    /// No usable telemetry this tick.
    Skipped,
    Terminated(AscentOutcome),
}

// ---------------------------------------------------------------------------
// Ascent controller: one snapshot, one pass over the control laws per tick
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AscentController {
    control: ControlConfig,
    resources: Vec<String>,
    settle_delay: Duration,
    dv_budget: f64,
    tracker: Option<DeltaVTracker>,
    pitch: PitchCommander,
    staging: StagingMachine,
    guard: ApoapsisGuard,
    applied_throttle: Option<f64>,
    last_status: Option<f64>,
    trace: Vec<TraceSample>,
}

impl AscentController {
    pub fn new(config: &MissionConfig) -> Self {
        Self {
            control: config.control.clone(),
            resources: config.staging.resources.clone(),
            settle_delay: secs(config.staging.settle_delay),
            dv_budget: config.throttle.ascent_delta_v_budget,
            tracker: None,
            pitch: PitchCommander::new(config.pitch.clone()),
            staging: StagingMachine::new(&config.staging, config.control.launch_throttle),
            guard: ApoapsisGuard::new(&config.guard),
            applied_throttle: None,
            last_status: None,
            trace: Vec::new(),
        }
    }

    pub fn staging(&self) -> &StagingMachine {
        &self.staging
    }

    pub fn guard(&self) -> &ApoapsisGuard {
        &self.guard
    }

    pub fn tracker(&self) -> Option<&DeltaVTracker> {
        self.tracker.as_ref()
    }

    pub fn trace(&self) -> &[TraceSample] {
        &self.trace
    }

    pub fn total_dv(&self) -> f64 {
        self.tracker.as_ref().map_or(0.0, DeltaVTracker::total_dv)
    }

    /// Countdown, ignition, autopilot vertical.
    pub async fn launch<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<(), GuidanceError> {
        let throttle = self.control.launch_throttle;
        platform.set_throttle(throttle).await?;
        self.applied_throttle = Some(throttle);

        for n in (1..=self.control.countdown).rev() {
            log::info!("{n}...");
            wait::sleep(cancel, Duration::from_secs(1)).await?;
        }

        platform.activate_next_stage().await?;
        platform.engage_autopilot().await?;
        platform.set_attitude(90.0, self.pitch.heading()).await?;
        self.pitch.confirm(90.0);

        let ut = match platform.read_telemetry().await {
            Ok(state) => state.ut,
            Err(e) if e.is_transient() => 0.0,
            Err(e) => return Err(e),
        };
        events.record(ut, EventKind::Liftoff);
        Ok(())
    }

    /// Fly the powered ascent until the guard trips or the stage list runs
    /// out. Any error leaves the engine at zero throttle.
    pub async fn run<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<AscentOutcome, GuidanceError> {
        let result = self.fly(platform, cancel, events).await;
        if result.is_err() {
            cut_throttle(platform).await;
            self.applied_throttle = Some(0.0);
        }
        result
    }

    async fn fly<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<AscentOutcome, GuidanceError> {
        let deadline = Deadline::after(secs(self.control.max_ascent_duration));
        let mut ticker = tokio::time::interval(secs(self.control.tick));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GuidanceError::Cancelled),
                _ = ticker.tick() => {}
            }
            if let TickOutcome::Terminated(outcome) = self.tick(platform, cancel, events).await? {
                return Ok(outcome);
            }
            if deadline.expired() {
                return Err(GuidanceError::AscentTimeout(deadline.waited()));
            }
        }
    }

    /// Single control pass: tracker, pitch, staging, throttle, guard.
    pub async fn tick<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<TickOutcome, GuidanceError> {
        let watch = self.staging.watched();
        let state = match telemetry::capture(platform, &watch, &self.resources).await {
            Ok(state) => state,
            Err(e) if e.is_transient() => {
                log::warn!("skipping tick: {e}");
                return Ok(TickOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let tracker = self.tracker.get_or_insert_with(|| DeltaVTracker::new(&state));
        let (total_dv, stage_dv) = tracker.update(&state);

        if !self.guard.is_tripped() {
            self.steer(platform, &state).await?;
        }

        if let StagingDecision::Separate(order) = self.staging.evaluate(&state) {
            self.separate(platform, cancel, events, &state, order).await?;
        }

        self.sync_throttle(platform).await?;

        let advisory = advisory_throttle(self.dv_budget - total_dv);
        self.trace.push(TraceSample {
            ut: state.ut,
            altitude: state.altitude,
            apoapsis: state.apoapsis_altitude,
            periapsis: state.periapsis_altitude,
            speed: state.speed(),
            stage: self.staging.active_stage(),
            throttle: self.applied_throttle.unwrap_or(0.0),
            advisory_throttle: advisory,
            pitch: self.pitch.last_issued(),
            total_dv,
            stage_dv,
        });
        self.report_status(&state, stage_dv, advisory);

        match self.guard.check(state.apoapsis_altitude) {
            Ok(()) => {}
            Err(GuidanceError::ApoapsisOverrun { apoapsis, limit }) => {
                cut_throttle(platform).await;
                self.applied_throttle = Some(0.0);
                events.record(state.ut, EventKind::GuardTripped { apoapsis, limit });
                return Ok(self.terminate(events, state, AscentEnd::GuardTrip));
            }
            Err(e) => return Err(e),
        }

        if self.staging.is_complete() {
            cut_throttle(platform).await;
            self.applied_throttle = Some(0.0);
            return Ok(self.terminate(events, state, AscentEnd::StagesExhausted));
        }

        Ok(TickOutcome::Continue)
    }

    fn terminate(&self, events: &mut EventLog, state: VehicleState, end: AscentEnd) -> TickOutcome {
        let total_dv = self.total_dv();
        events.record(state.ut, EventKind::AscentComplete { reason: end, total_dv });
        TickOutcome::Terminated(AscentOutcome { end, total_dv, final_state: state })
    }

    async fn steer<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        state: &VehicleState,
    ) -> Result<(), GuidanceError> {
        let Some(pitch) = self.pitch.next_command(state.altitude) else {
            return Ok(());
        };
        match platform.set_attitude(pitch, self.pitch.heading()).await {
            Ok(()) => {
                self.pitch.confirm(pitch);
                Ok(())
            }
            Err(e) if e.is_transient() => {
                log::warn!("attitude command deferred: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Actuate the remaining staging commands of `order`. A rejection leaves
    /// the order pending; the next tick picks up where this one stopped.
    async fn separate<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
        state: &VehicleState,
        order: SeparationOrder,
    ) -> Result<(), GuidanceError> {
        let mut sent = order.commands_sent;
        while sent < order.commands {
            if sent > 0 {
                wait::sleep(cancel, self.settle_delay).await?;
            }
            match platform.activate_next_stage().await {
                Ok(()) => {
                    self.staging.command_sent();
                    sent += 1;
                }
                Err(e) if e.is_transient() => {
                    log::warn!("separation of {} stalled after {sent} command(s): {e}", order.from);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        let Some(transition) = self.staging.commit() else {
            return Ok(());
        };
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset_stage(state);
        }
        events.record(
            state.ut,
            EventKind::StageSeparated {
                from: transition.from,
                to: transition.to,
                trigger: transition.trigger,
            },
        );
        Ok(())
    }

    /// Bring the platform throttle in line with the staging setpoint.
    async fn sync_throttle<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
    ) -> Result<(), GuidanceError> {
        let desired = self.guard.allowed_throttle(self.staging.throttle());
        if self.applied_throttle == Some(desired) {
            return Ok(());
        }
        match platform.set_throttle(desired).await {
            Ok(()) => {
                self.applied_throttle = Some(desired);
                Ok(())
            }
            Err(e) if e.is_transient() => {
                log::warn!("throttle {desired:.2} deferred: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn report_status(&mut self, state: &VehicleState, stage_dv: f64, advisory: f64) {
        let due = self
            .last_status
            .map_or(true, |last| state.ut - last >= self.control.status_interval);
        if !due {
            return;
        }
        self.last_status = Some(state.ut);
        let stage = self
            .staging
            .active_stage()
            .map_or_else(|| "complete".to_string(), |s| s.to_string());
        log::info!(
            "stage {stage} ({} dropped): dv={stage_dv:.0} m/s alt={:.1} km apo={:.1} km advisory={advisory:.2}",
            self.staging.separated_count(),
            state.altitude / 1000.0,
            state.apoapsis_altitude / 1000.0,
        );
    }
}
