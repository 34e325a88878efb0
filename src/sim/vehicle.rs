//! Simulated launch vehicle behind the [`VesselPlatform`] boundary.
//!
//! Physics advances by the tokio clock: every platform call first integrates
//! up to `Instant::now()`, so a paused runtime flies the mission in virtual time.

use async_trait::async_trait;
use nalgebra::Vector2;
use tokio::time::Instant;

use super::dynamics::{Forces, PointState};
use super::integrator::rk4_step;
use crate::error::GuidanceError;
use crate::orbital::PlanarElements;
use crate::physics::Body;
use crate::platform::{ManeuverHandle, VesselPlatform};
use crate::telemetry::{StageId, VehicleState};
use crate::vehicle::{presets, Stack, Stage};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub substep: f64,       // s, RK4 step under power or in atmosphere
    pub warp_substep: f64,  // s, RK4 step while time-warping
    pub slew_rate: f64,     // deg/s
    pub fuel_fraction: f64, // LiquidFuel share of propellant mass, rest is Oxidizer
    /// Every n-th telemetry read fails.
    pub dropout_every: Option<u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            substep: 0.02,
            warp_substep: 0.5,
            slew_rate: 5.0,
            fuel_fraction: 0.45,
            dropout_every: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Ignite(usize),
    Decouple(usize),
}

#[derive(Debug, Clone)]
struct LiveStage {
    params: Stage,
    propellant: f64,
    attached: bool,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    handle: ManeuverHandle,
    prograde_dv: f64,
    achieved: f64,
}

// ---------------------------------------------------------------------------
// Simulated vehicle
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SimVehicle {
    body: Body,
    config: SimConfig,
    stages: Vec<LiveStage>,
    sequence: Vec<Action>,
    next_action: usize,
    lit: Option<usize>,
    state: PointState,
    ut: f64,
    last_sync: Instant,
    throttle: f64,
    autopilot: bool,
    pitch: f64, // deg, current pointing
    pitch_target: f64,
    clamped: bool,
    nodes: Vec<Node>,
    next_handle: u64,
    reads: u32,
    design_dv: f64, // m/s, ideal for the stack as built
}

impl SimVehicle {
    /// Vehicle on the pad, clamped until the first ignition.
    pub fn new(stack: Stack, body: Body, config: SimConfig) -> Self {
        let n = stack.stages.len();
        let design_dv = stack.total_delta_v();
        log::info!("{}: {n} stages, ideal delta-v {design_dv:.0} m/s", stack.name);
        let mut sequence = Vec::with_capacity(2 * n);
        for i in 0..n {
            sequence.push(Action::Ignite(i));
            if i + 1 < n {
                sequence.push(Action::Decouple(i));
            }
        }
        let stages: Vec<LiveStage> = stack
            .stages
            .into_iter()
            .map(|params| LiveStage { propellant: params.propellant_mass, params, attached: true })
            .collect();
        let mass = stages.iter().map(|s| s.params.total_mass()).sum();

        Self {
            body,
            config,
            stages,
            sequence,
            next_action: 0,
            lit: None,
            state: PointState {
                pos: Vector2::new(0.0, body.radius),
                vel: Vector2::zeros(),
                mass,
            },
            ut: 0.0,
            last_sync: Instant::now(),
            throttle: 0.0,
            autopilot: false,
            pitch: 90.0,
            pitch_target: 90.0,
            clamped: true,
            nodes: Vec::new(),
            next_handle: 0,
            reads: 0,
            design_dv,
        }
    }

    /// Four-stage orbiter on the Kerbin pad.
    pub fn kerbin(config: SimConfig) -> Self {
        Self::new(presets::kerbin_four_stage(), Body::kerbin(), config)
    }

    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    /// Ideal delta-v of the stack the vehicle was built from.
    pub fn design_delta_v(&self) -> f64 {
        self.design_dv
    }

    pub fn ut(&self) -> f64 {
        self.ut
    }

    pub fn attached_stages(&self) -> usize {
        self.stages.iter().filter(|s| s.attached).count()
    }

    pub fn live_maneuvers(&self) -> usize {
        self.nodes.len()
    }

    /// Telemetry as the platform would report it right now.
    pub fn snapshot(&self) -> VehicleState {
        let PointState { pos, vel, mass } = self.state;
        let mu = self.body.mu;
        let radius = self.body.radius;
        let elements = PlanarElements::from_state_vector_mu(&pos, &vel, mu);
        let up = self.state.up();
        let vertical_speed = vel.dot(&up);
        let (available_thrust, specific_impulse) = match self.burning_stage() {
            Some(stage) => (stage.params.thrust, stage.params.isp),
            None => (0.0, 0.0),
        };

        VehicleState {
            ut: self.ut,
            altitude: pos.norm() - radius,
            apoapsis_altitude: elements.apoapsis - radius,
            periapsis_altitude: elements.periapsis - radius,
            time_to_apoapsis: elements.time_to_apoapsis(mu),
            vertical_speed,
            horizontal_speed: (vel - up * vertical_speed).norm(),
            available_thrust,
            specific_impulse,
            mass,
            semi_major_axis: elements.sma,
            mu,
            body_radius: radius,
            ..Default::default()
        }
    }

    fn burning_stage(&self) -> Option<&LiveStage> {
        self.lit
            .map(|i| &self.stages[i])
            .filter(|s| s.attached && s.propellant > 0.0)
    }

    fn stack_mass(&self) -> f64 {
        self.stages
            .iter()
            .filter(|s| s.attached)
            .map(|s| s.params.dry_mass + s.propellant)
            .sum()
    }

    /// Integrate up to the current tokio instant.
    fn sync(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_sync).as_secs_f64();
        self.last_sync = now;
        self.advance(dt, self.config.substep);
    }

    fn advance(&mut self, dt: f64, substep: f64) {
        let mut left = dt;
        while left > 1e-9 {
            let h = left.min(substep);
            self.step(h);
            left -= h;
        }
    }

    fn step(&mut self, dt: f64) {
        self.ut += dt;
        if self.autopilot {
            let max = self.config.slew_rate * dt;
            self.pitch += (self.pitch_target - self.pitch).clamp(-max, max);
        }
        if self.clamped {
            return;
        }

        let forces = self.forces(dt);
        let speed_before = self.state.vel.norm();
        self.state = rk4_step(&self.state, &self.body, &forces, dt);
        if let Some(i) = self.lit {
            let stage = &mut self.stages[i];
            stage.propellant = (stage.propellant - forces.mass_flow * dt).max(0.0);
        }
        self.state.mass = self.stack_mass();

        if forces.thrust > 0.0 {
            let gained = self.state.vel.norm() - speed_before;
            for node in &mut self.nodes {
                node.achieved += gained;
            }
        }
        self.ground_contact();
    }

    fn forces(&self, dt: f64) -> Forces {
        let cd_area = self
            .stages
            .iter()
            .find(|s| s.attached)
            .map_or(0.0, |s| s.params.cd * s.params.area);
        let mut forces = Forces { pitch: self.pitch.to_radians(), cd_area, ..Default::default() };

        if let Some(stage) = self.burning_stage() {
            if self.throttle > 0.0 {
                let full_flow = stage.params.mass_flow() * self.throttle;
                // Flameout part-way through the step
                let fraction = (stage.propellant / (full_flow * dt)).min(1.0);
                forces.thrust = stage.params.thrust * self.throttle * fraction;
                forces.mass_flow = full_flow * fraction;
            }
        }
        forces
    }

    fn ground_contact(&mut self) {
        let r = self.state.pos.norm();
        if r >= self.body.radius {
            return;
        }
        let up = self.state.up();
        self.state.pos = up * self.body.radius;
        let sink = self.state.vel.dot(&up);
        if sink < 0.0 {
            self.state.vel -= up * sink;
        }
    }
}

#[async_trait]
impl VesselPlatform for SimVehicle {
    async fn read_telemetry(&mut self) -> Result<VehicleState, GuidanceError> {
        self.sync();
        self.reads += 1;
        if let Some(n) = self.config.dropout_every {
            if n > 0 && self.reads % n == 0 {
                return Err(GuidanceError::TelemetryUnavailable(format!("dropped read #{}", self.reads)));
            }
        }
        Ok(self.snapshot())
    }

    async fn resources_remaining(
        &mut self,
        stage: StageId,
        resource: &str,
    ) -> Result<f64, GuidanceError> {
        self.sync();
        let share = match resource {
            "LiquidFuel" => self.config.fuel_fraction,
            "Oxidizer" => 1.0 - self.config.fuel_fraction,
            _ => 0.0,
        };
        Ok(self
            .stages
            .iter()
            .find(|s| s.attached && s.params.decouple_id == stage)
            .map_or(0.0, |s| s.propellant * share))
    }

    async fn set_throttle(&mut self, fraction: f64) -> Result<(), GuidanceError> {
        if !fraction.is_finite() {
            return Err(GuidanceError::rejected("set_throttle", format!("invalid setting {fraction}")));
        }
        self.sync();
        self.throttle = fraction.clamp(0.0, 1.0);
        Ok(())
    }

    // Planar model: every heading flies the same downrange plane
    async fn set_attitude(&mut self, pitch_deg: f64, _heading_deg: f64) -> Result<(), GuidanceError> {
        self.sync();
        self.pitch_target = pitch_deg.clamp(-90.0, 90.0);
        Ok(())
    }

    async fn attitude_error(&mut self) -> Result<f64, GuidanceError> {
        self.sync();
        Ok((self.pitch_target - self.pitch).abs())
    }

    async fn engage_autopilot(&mut self) -> Result<(), GuidanceError> {
        self.sync();
        self.autopilot = true;
        Ok(())
    }

    async fn disengage_autopilot(&mut self) -> Result<(), GuidanceError> {
        self.sync();
        self.autopilot = false;
        Ok(())
    }

    async fn activate_next_stage(&mut self) -> Result<(), GuidanceError> {
        self.sync();
        let Some(&action) = self.sequence.get(self.next_action) else {
            return Err(GuidanceError::rejected("activate_next_stage", "staging sequence exhausted"));
        };
        self.next_action += 1;
        match action {
            Action::Ignite(i) => {
                self.lit = Some(i);
                self.clamped = false;
                log::debug!("[sim ut={:.1}] ignite {}", self.ut, self.stages[i].params.name);
            }
            Action::Decouple(i) => {
                self.stages[i].attached = false;
                if self.lit == Some(i) {
                    self.lit = None;
                }
                self.state.mass = self.stack_mass();
                log::debug!("[sim ut={:.1}] decouple {}", self.ut, self.stages[i].params.name);
            }
        }
        Ok(())
    }

    async fn create_maneuver(
        &mut self,
        epoch: f64,
        prograde_dv: f64,
    ) -> Result<ManeuverHandle, GuidanceError> {
        self.sync();
        if epoch < self.ut {
            return Err(GuidanceError::rejected("create_maneuver", format!("epoch {epoch:.1} is in the past")));
        }
        self.next_handle += 1;
        let handle = ManeuverHandle(self.next_handle);
        self.nodes.push(Node { handle, prograde_dv, achieved: 0.0 });
        Ok(handle)
    }

    async fn remove_maneuver(&mut self, handle: ManeuverHandle) -> Result<(), GuidanceError> {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.handle != handle);
        if self.nodes.len() == before {
            return Err(GuidanceError::rejected("remove_maneuver", format!("no node {}", handle.0)));
        }
        Ok(())
    }

    async fn remaining_delta_v(&mut self, handle: ManeuverHandle) -> Result<f64, GuidanceError> {
        self.sync();
        self.nodes
            .iter()
            .find(|n| n.handle == handle)
            .map(|n| n.prograde_dv - n.achieved)
            .ok_or_else(|| GuidanceError::rejected("remaining_delta_v", format!("no node {}", handle.0)))
    }

    async fn request_time_acceleration(&mut self, target_epoch: f64) -> Result<(), GuidanceError> {
        self.sync();
        if !target_epoch.is_finite() {
            return Err(GuidanceError::ManeuverInfeasible(format!(
                "warp target {target_epoch} is not a time"
            )));
        }
        if self.throttle > 0.0 && self.burning_stage().is_some() {
            return Err(GuidanceError::rejected("request_time_acceleration", "engine is running"));
        }
        if target_epoch > self.ut {
            log::debug!("[sim ut={:.1}] warp to {target_epoch:.1}", self.ut);
            self.advance(target_epoch - self.ut, self.config.warp_substep);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn held_on_pad_until_ignition() {
        let mut sim = SimVehicle::kerbin(SimConfig::default());
        sim.set_throttle(1.0).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let state = sim.read_telemetry().await.unwrap();
        assert!(state.altitude.abs() < 1e-6);
        assert!((state.ut - 2.0).abs() < 1e-6);

        sim.activate_next_stage().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = sim.read_telemetry().await.unwrap();
        assert!(state.altitude > 10.0, "alt {}", state.altitude);
        assert!(state.vertical_speed > 0.0);
        assert!(state.mass < 74_500.0);
    }

    #[test]
    fn design_delta_v_covers_ascent_budget() {
        let sim = SimVehicle::kerbin(SimConfig::default());
        let budget = crate::config::ThrottleConfig::default().ascent_delta_v_budget;
        assert_eq!(sim.design_delta_v(), presets::kerbin_four_stage().total_delta_v());
        assert!(sim.design_delta_v() > budget, "dv {}", sim.design_delta_v());
    }

    #[tokio::test(start_paused = true)]
    async fn staging_sequence_drops_and_lights() {
        let mut sim = SimVehicle::kerbin(SimConfig::default());
        sim.activate_next_stage().await.unwrap();
        assert!(sim.resources_remaining(StageId(9), "LiquidFuel").await.unwrap() > 0.0);

        sim.activate_next_stage().await.unwrap(); // drop booster
        assert_eq!(sim.attached_stages(), 3);
        assert_eq!(sim.resources_remaining(StageId(9), "Oxidizer").await.unwrap(), 0.0);
        assert_eq!(sim.read_telemetry().await.unwrap().available_thrust, 0.0);

        sim.activate_next_stage().await.unwrap(); // light sustainer
        assert_eq!(sim.read_telemetry().await.unwrap().available_thrust, 500_000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn propellant_split_and_unknown_resources() {
        let mut sim = SimVehicle::kerbin(SimConfig::default());
        let fuel = sim.resources_remaining(StageId(7), "LiquidFuel").await.unwrap();
        let ox = sim.resources_remaining(StageId(7), "Oxidizer").await.unwrap();
        assert!((fuel + ox - 15_000.0).abs() < 1e-6);
        assert!(ox > fuel);
        assert_eq!(sim.resources_remaining(StageId(7), "MonoPropellant").await.unwrap(), 0.0);
        assert_eq!(sim.resources_remaining(StageId(42), "LiquidFuel").await.unwrap(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn warp_refused_under_thrust() {
        let mut sim = SimVehicle::kerbin(SimConfig::default());
        sim.activate_next_stage().await.unwrap();
        sim.set_throttle(1.0).await.unwrap();
        let err = sim.request_time_acceleration(100.0).await.unwrap_err();
        assert!(err.is_transient());

        sim.set_throttle(0.0).await.unwrap();
        sim.request_time_acceleration(100.0).await.unwrap();
        assert!((sim.ut() - 100.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn warp_to_infinity_is_refused() {
        let mut sim = SimVehicle::kerbin(SimConfig::default());
        let err = sim.request_time_acceleration(f64::INFINITY).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(sim.ut() < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn autopilot_slews_at_finite_rate() {
        let mut sim = SimVehicle::kerbin(SimConfig::default());
        sim.set_attitude(40.0, 90.0).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        // not engaged: no motion
        assert!((sim.attitude_error().await.unwrap() - 50.0).abs() < 1e-9);

        sim.engage_autopilot().await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!((sim.attitude_error().await.unwrap() - 30.0).abs() < 1e-6);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(sim.attitude_error().await.unwrap() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_dropouts() {
        let mut sim = SimVehicle::kerbin(SimConfig { dropout_every: Some(3), ..Default::default() });
        assert!(sim.read_telemetry().await.is_ok());
        assert!(sim.read_telemetry().await.is_ok());
        assert!(matches!(
            sim.read_telemetry().await,
            Err(GuidanceError::TelemetryUnavailable(_))
        ));
        assert!(sim.read_telemetry().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn node_tracks_burned_delta_v() {
        let mut sim = SimVehicle::kerbin(SimConfig::default());
        let handle = sim.create_maneuver(10.0, 50.0).await.unwrap();
        assert!((sim.remaining_delta_v(handle).await.unwrap() - 50.0).abs() < 1e-9);
        sim.remove_maneuver(handle).await.unwrap();
        assert_eq!(sim.live_maneuvers(), 0);
        assert!(sim.remaining_delta_v(handle).await.is_err());
    }
}
