//! Circularization sequence flown after the powered ascent.
//!
//! The planner is a resumable phase machine: a convergence timeout leaves it
//! parked in the phase that timed out, and the next [`ManeuverPlanner::run`]
//! continues from there.

use std::time::Duration;

use serde::Serialize;
use strum_macros::Display;
use tokio_util::sync::CancellationToken;

use super::burn::estimate_burn;
use super::maneuvers::circularize_at_apoapsis;
use crate::config::{secs, ManeuverConfig, MissionConfig};
use crate::error::GuidanceError;
use crate::events::{EventKind, EventLog};
use crate::platform::{cut_throttle, ManeuverHandle, VesselPlatform};
use crate::telemetry::VehicleState;
use crate::wait::{self, Deadline};

/// Retry a platform call while it is refused, one poll interval apart.
/// Evaluates to `None` once `$deadline` has run out; a non-transient error
/// returns from the enclosing function.
macro_rules! persist {
    ($planner:expr, $cancel:expr, $deadline:expr, $what:literal, $call:expr) => {
        loop {
            match $call.await {
                Ok(value) => break Some(value),
                Err(e) if e.is_transient() => {
                    if $deadline.expired() {
                        log::warn!("{} still refused after {:.1} s: {e}", $what, $deadline.waited());
                        break None;
                    }
                    log::warn!("{} retrying: {e}", $what);
                    wait::sleep($cancel, $planner.poll).await?;
                }
                Err(e) => return Err(e),
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlannerPhase {
    WaitCoastAltitude,
    ReleaseToOrbitStage,
    ComputeNode,
    Orient,
    Warp,
    Burn,
    Trim,
    Done,
}

/// The circularization node as created on the platform.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ManeuverPlan {
    pub handle: ManeuverHandle,
    pub prograde_dv: f64,  // m/s
    pub node_epoch: f64,   // UT of apoapsis
    pub burn_time: f64,    // s at full thrust
    pub target_speed: f64, // m/s, circular speed at `radius`
    pub radius: f64,       // m
}

impl ManeuverPlan {
    /// Live remaining delta-v: target circular speed minus current speed.
    pub fn remaining_delta_v(&self, state: &VehicleState) -> f64 {
        self.target_speed - state.speed()
    }

    /// Ignition time that centres the burn on the node.
    pub fn burn_start(&self) -> f64 {
        self.node_epoch - self.burn_time / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct ManeuverReport {
    pub plan: Option<ManeuverPlan>,
    pub final_state: VehicleState,
    /// Remaining delta-v the platform reported for the node when trim began.
    pub node_residual: Option<f64>,
    pub warnings: u32,
}

/// Trim throttle for `remaining` m/s: proportional, capped at the trim
/// setting and never below a fifth of it so the last decimetres still close.
pub fn trim_command(remaining: f64, config: &ManeuverConfig) -> f64 {
    let cap = config.trim_throttle;
    (remaining * config.trim_gain).clamp(0.2 * cap, cap)
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ManeuverPlanner {
    config: ManeuverConfig,
    heading: f64,
    settle_delay: Duration,
    poll: Duration,
    command_timeout: Duration,
    phase: PlannerPhase,
    releases_sent: u32,
    plan: Option<ManeuverPlan>,
    node_residual: Option<f64>,
    last_ut: f64,
    warnings: u32,
}

impl ManeuverPlanner {
    pub fn new(config: &MissionConfig) -> Self {
        Self {
            config: config.maneuver.clone(),
            heading: config.pitch.heading,
            settle_delay: secs(config.staging.settle_delay),
            poll: secs(config.control.tick),
            command_timeout: secs(config.maneuver.command_timeout),
            phase: PlannerPhase::WaitCoastAltitude,
            releases_sent: 0,
            plan: None,
            node_residual: None,
            last_ut: 0.0,
            warnings: 0,
        }
    }

    pub fn phase(&self) -> PlannerPhase {
        self.phase
    }

    pub fn plan(&self) -> Option<&ManeuverPlan> {
        self.plan.as_ref()
    }

    /// Drive the sequence to `DONE` from wherever it stopped. Any error leaves
    /// the engine at zero throttle.
    pub async fn run<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<ManeuverReport, GuidanceError> {
        let result = self.execute(platform, cancel, events).await;
        if result.is_err() {
            cut_throttle(platform).await;
        }
        result
    }

    async fn execute<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<ManeuverReport, GuidanceError> {
        loop {
            wait::check(cancel)?;
            log::debug!("maneuver phase {}", self.phase);
            let next = match self.phase {
                PlannerPhase::WaitCoastAltitude => self.coast(platform, cancel, events).await?,
                PlannerPhase::ReleaseToOrbitStage => self.release(platform, cancel, events).await?,
                PlannerPhase::ComputeNode => self.compute_node(platform, cancel, events).await?,
                PlannerPhase::Orient => self.orient(platform, cancel, events).await?,
                PlannerPhase::Warp => self.warp(platform, cancel, events).await?,
                PlannerPhase::Burn => self.burn(platform, cancel, events).await?,
                PlannerPhase::Trim => self.trim(platform, cancel, events).await?,
                PlannerPhase::Done => {
                    let final_state = self.read_state(platform, cancel, events).await?;
                    return Ok(ManeuverReport {
                        plan: self.plan,
                        final_state,
                        node_residual: self.node_residual,
                        warnings: self.warnings,
                    });
                }
            };
            self.phase = next;
        }
    }

    async fn coast<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<PlannerPhase, GuidanceError> {
        let deadline = Deadline::after(secs(self.config.coast_timeout));
        loop {
            if let Some(state) = self.poll_state(platform).await? {
                if state.altitude > self.config.coast_altitude {
                    return Ok(PlannerPhase::ReleaseToOrbitStage);
                }
                if state.vertical_speed < 0.0 && state.apoapsis_altitude <= self.config.coast_altitude {
                    return Err(GuidanceError::ManeuverInfeasible(format!(
                        "falling with apoapsis {:.0} m below coast altitude {:.0} m",
                        state.apoapsis_altitude, self.config.coast_altitude
                    )));
                }
            }
            if deadline.expired() {
                self.unconverged(events, deadline.waited())?;
                return Ok(PlannerPhase::ReleaseToOrbitStage);
            }
            wait::sleep(cancel, self.poll).await?;
        }
    }

    async fn release<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<PlannerPhase, GuidanceError> {
        if self.config.release_commands == 0 {
            return Ok(PlannerPhase::ComputeNode);
        }
        while self.releases_sent < self.config.release_commands {
            if self.releases_sent > 0 {
                wait::sleep(cancel, self.settle_delay).await?;
            }
            let deadline = Deadline::after(self.command_timeout);
            if persist!(self, cancel, deadline, "orbit stage release", platform.activate_next_stage()).is_none() {
                return self.stalled(events, deadline.waited());
            }
            self.releases_sent += 1;
        }
        let ut = self.read_state(platform, cancel, events).await?.ut;
        events.record(ut, EventKind::OrbitStageReleased);
        Ok(PlannerPhase::ComputeNode)
    }

    /// Size the burn from fresh telemetry and create the node. A refused
    /// node is recomputed on the next attempt, so its epoch never goes stale.
    async fn compute_node<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<PlannerPhase, GuidanceError> {
        let deadline = Deadline::after(self.command_timeout);
        loop {
            let state = self.read_state(platform, cancel, events).await?;
            if !(state.time_to_apoapsis >= 0.0 && state.time_to_apoapsis.is_finite()) {
                return Err(GuidanceError::ManeuverInfeasible(format!(
                    "no apoapsis ahead (time to apoapsis {})",
                    state.time_to_apoapsis
                )));
            }
            let burn = circularize_at_apoapsis(state.mu, state.apoapsis_radius(), state.semi_major_axis)?;
            let estimate = estimate_burn(
                burn.delta_v,
                state.available_thrust,
                state.specific_impulse,
                state.mass,
            )?;
            let epoch = state.ut + state.time_to_apoapsis;

            match platform.create_maneuver(epoch, burn.delta_v).await {
                Ok(handle) => {
                    log::info!(
                        "circularize at r={:.1} km: {:.0} -> {:.0} m/s, burn {:.1} s",
                        burn.radius / 1000.0,
                        burn.current_speed,
                        burn.target_speed,
                        estimate.duration,
                    );
                    self.plan = Some(ManeuverPlan {
                        handle,
                        prograde_dv: burn.delta_v,
                        node_epoch: epoch,
                        burn_time: estimate.duration,
                        target_speed: burn.target_speed,
                        radius: burn.radius,
                    });
                    events.record(
                        state.ut,
                        EventKind::ManeuverPlanned {
                            prograde_dv: burn.delta_v,
                            epoch,
                            burn_time: estimate.duration,
                        },
                    );
                    return Ok(PlannerPhase::Orient);
                }
                Err(e) if e.is_transient() => {
                    if deadline.expired() {
                        log::warn!("node creation still refused: {e}");
                        return self.stalled(events, deadline.waited());
                    }
                    log::warn!("node creation retrying: {e}");
                    wait::sleep(cancel, self.poll).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn orient<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<PlannerPhase, GuidanceError> {
        let deadline = Deadline::after(secs(self.config.orient_timeout));
        // Prograde at apoapsis lies on the local horizon
        if persist!(self, cancel, deadline, "autopilot engage", platform.engage_autopilot()).is_none()
            || persist!(self, cancel, deadline, "node attitude", platform.set_attitude(0.0, self.heading))
                .is_none()
        {
            self.unconverged(events, deadline.waited())?;
            return Ok(PlannerPhase::Warp);
        }

        loop {
            match platform.attitude_error().await {
                Ok(error) if error <= self.config.attitude_tolerance => {
                    log::debug!("aligned to node within {error:.2} deg");
                    return Ok(PlannerPhase::Warp);
                }
                Ok(_) => {}
                Err(e) if e.is_transient() => log::warn!("attitude error unavailable: {e}"),
                Err(e) => return Err(e),
            }
            if deadline.expired() {
                self.unconverged(events, deadline.waited())?;
                return Ok(PlannerPhase::Warp);
            }
            wait::sleep(cancel, self.poll).await?;
        }
    }

    async fn warp<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<PlannerPhase, GuidanceError> {
        let plan = self.require_plan()?;
        let target = plan.burn_start() - self.config.warp_lead_time;
        let state = self.read_state(platform, cancel, events).await?;
        if state.ut >= target - self.config.warp_tolerance {
            log::debug!("no warp needed, {:.1} s to ignition", plan.burn_start() - state.ut);
            return Ok(PlannerPhase::Burn);
        }

        let deadline = Deadline::after(secs(self.config.warp_timeout));
        if persist!(self, cancel, deadline, "time acceleration", platform.request_time_acceleration(target))
            .is_none()
        {
            self.unconverged(events, deadline.waited())?;
            return Ok(PlannerPhase::Burn);
        }
        loop {
            if let Some(state) = self.poll_state(platform).await? {
                if state.ut >= target - self.config.warp_tolerance {
                    return Ok(PlannerPhase::Burn);
                }
            }
            if deadline.expired() {
                self.unconverged(events, deadline.waited())?;
                return Ok(PlannerPhase::Burn);
            }
            wait::sleep(cancel, self.poll).await?;
        }
    }

    async fn burn<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<PlannerPhase, GuidanceError> {
        let plan = self.require_plan()?;
        let state = self.read_state(platform, cancel, events).await?;
        let lead = plan.burn_start() - state.ut;
        if lead > 0.0 {
            wait::sleep(cancel, secs(lead)).await?;
        }

        let deadline = Deadline::after(self.command_timeout);
        if persist!(self, cancel, deadline, "burn throttle", platform.set_throttle(1.0)).is_none() {
            return self.stalled(events, deadline.waited());
        }
        events.record(state.ut + lead.max(0.0), EventKind::BurnStarted { throttle: 1.0 });
        wait::sleep(cancel, secs(plan.burn_time - self.config.trim_reserve)).await?;

        let trim = self.config.trim_throttle;
        let deadline = Deadline::after(self.command_timeout);
        if persist!(self, cancel, deadline, "trim throttle", platform.set_throttle(trim)).is_none() {
            return self.stalled(events, deadline.waited());
        }
        Ok(PlannerPhase::Trim)
    }

    async fn trim<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<PlannerPhase, GuidanceError> {
        let plan = self.require_plan()?;
        match platform.remaining_delta_v(plan.handle).await {
            Ok(dv) => {
                log::info!("node reports {dv:.2} m/s remaining");
                self.node_residual = Some(dv);
            }
            Err(e) if e.is_transient() => log::warn!("node remaining delta-v unavailable: {e}"),
            Err(e) => return Err(e),
        }

        let deadline = Deadline::after(secs(self.config.trim_timeout));
        let mut remaining = f64::NAN;
        loop {
            if let Some(state) = self.poll_state(platform).await? {
                remaining = plan.remaining_delta_v(&state);
                if remaining <= self.config.trim_tolerance {
                    break;
                }
                let throttle = trim_command(remaining, &self.config);
                if let Err(e) = platform.set_throttle(throttle).await {
                    if !e.is_transient() {
                        return Err(e);
                    }
                    log::warn!("trim throttle {throttle:.3} deferred: {e}");
                }
            }
            if deadline.expired() {
                let waited = deadline.waited();
                self.engine_cutoff(platform, cancel, events).await?;
                self.unconverged(events, waited)?;
                break;
            }
            wait::sleep(cancel, self.poll).await?;
        }

        self.engine_cutoff(platform, cancel, events).await?;
        if let Err(e) = platform.remove_maneuver(plan.handle).await {
            log::warn!("could not remove node {:?}: {e}", plan.handle);
        }
        if let Err(e) = platform.disengage_autopilot().await {
            log::warn!("autopilot disengage failed: {e}");
        }
        events.record(self.last_ut, EventKind::BurnCompleted { remaining_dv: remaining });
        Ok(PlannerPhase::Done)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_plan(&self) -> Result<ManeuverPlan, GuidanceError> {
        self.plan.ok_or_else(|| {
            GuidanceError::ManeuverInfeasible(format!("{} reached without a node", self.phase))
        })
    }

    /// Record a convergence warning for the current phase. Without
    /// `proceed_on_timeout` the phase is kept and the timeout returned.
    fn unconverged(&mut self, events: &mut EventLog, waited: f64) -> Result<(), GuidanceError> {
        self.warnings += 1;
        events.record(self.last_ut, EventKind::ConvergenceWarning { phase: self.phase, waited });
        if self.config.proceed_on_timeout {
            Ok(())
        } else {
            Err(GuidanceError::ManeuverConvergenceTimeout { phase: self.phase, waited })
        }
    }

    /// A command the platform kept refusing. Recorded like a convergence
    /// failure, but the phase cannot be skipped.
    fn stalled<T>(&mut self, events: &mut EventLog, waited: f64) -> Result<T, GuidanceError> {
        self.warnings += 1;
        events.record(self.last_ut, EventKind::ConvergenceWarning { phase: self.phase, waited });
        Err(GuidanceError::ManeuverConvergenceTimeout { phase: self.phase, waited })
    }

    async fn engine_cutoff<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<(), GuidanceError> {
        let deadline = Deadline::after(self.command_timeout);
        match persist!(self, cancel, deadline, "engine cutoff", platform.set_throttle(0.0)) {
            Some(()) => Ok(()),
            None => self.stalled(events, deadline.waited()),
        }
    }

    /// One telemetry read; `None` on a transient dropout.
    async fn poll_state<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
    ) -> Result<Option<VehicleState>, GuidanceError> {
        match platform.read_telemetry().await {
            Ok(state) => {
                self.last_ut = state.ut;
                Ok(Some(state))
            }
            Err(e) if e.is_transient() => {
                log::warn!("telemetry dropout: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Telemetry read that rides out dropouts for up to the command timeout.
    async fn read_state<P: VesselPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Result<VehicleState, GuidanceError> {
        let deadline = Deadline::after(self.command_timeout);
        let state = persist!(self, cancel, deadline, "telemetry", platform.read_telemetry());
        match state {
            Some(state) => {
                self.last_ut = state.ut;
                Ok(state)
            }
            None => self.stalled(events, deadline.waited()),
        }
    }
}
