//! Scripted platform for tests: replays telemetry and records every command.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;

use super::{ManeuverHandle, VesselPlatform};
use crate::error::GuidanceError;
use crate::telemetry::{StageId, VehicleState};

/// A command as the platform received it.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Throttle(f64),
    Attitude { pitch: f64, heading: f64 },
    EngageAutopilot,
    DisengageAutopilot,
    ActivateStage,
    CreateManeuver { epoch: f64, prograde_dv: f64 },
    RemoveManeuver(ManeuverHandle),
    TimeAcceleration(f64),
}

/// Replays queued states; the last one repeats once the queue drains.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    states: VecDeque<VehicleState>,
    resources: HashMap<(StageId, String), f64>,
    commands: Vec<Command>,
    rejections: HashMap<&'static str, (u32, u32)>,
    telemetry_dropouts: u32,
    attitude_error: f64,
    remaining_dv: f64,
    ut_floor: f64,
    next_handle: u64,
    live_nodes: HashSet<ManeuverHandle>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_state(&mut self, state: VehicleState) {
        self.states.push_back(state);
    }

    pub fn set_resource(&mut self, stage: StageId, resource: &str, amount: f64) {
        self.resources.insert((stage, resource.to_string()), amount);
    }

    /// The next `count` telemetry reads fail.
    pub fn drop_telemetry(&mut self, count: u32) {
        self.telemetry_dropouts = count;
    }

    /// The next `count` calls of `command` (trait method name) are rejected.
    pub fn reject(&mut self, command: &'static str, count: u32) {
        self.reject_after(command, 0, count);
    }

    /// Accept `skip` calls of `command`, then reject `count`.
    pub fn reject_after(&mut self, command: &'static str, skip: u32, count: u32) {
        self.rejections.insert(command, (skip, count));
    }

    pub fn set_attitude_error(&mut self, degrees: f64) {
        self.attitude_error = degrees;
    }

    pub fn set_remaining_delta_v(&mut self, dv: f64) {
        self.remaining_dv = dv;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    pub fn last_throttle(&self) -> Option<f64> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::Throttle(t) => Some(*t),
            _ => None,
        })
    }

    pub fn live_maneuvers(&self) -> usize {
        self.live_nodes.len()
    }

    fn check(&mut self, command: &'static str) -> Result<(), GuidanceError> {
        if let Some((skip, left)) = self.rejections.get_mut(command) {
            if *skip > 0 {
                *skip -= 1;
            } else if *left > 0 {
                *left -= 1;
                return Err(GuidanceError::rejected(command, "scripted rejection"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VesselPlatform for RecordingPlatform {
    async fn read_telemetry(&mut self) -> Result<VehicleState, GuidanceError> {
        if self.telemetry_dropouts > 0 {
            self.telemetry_dropouts -= 1;
            return Err(GuidanceError::TelemetryUnavailable("scripted dropout".into()));
        }
        let mut state = if self.states.len() > 1 {
            self.states.pop_front()
        } else {
            self.states.front().cloned()
        }
        .ok_or_else(|| GuidanceError::TelemetryUnavailable("no telemetry scripted".into()))?;
        state.ut = state.ut.max(self.ut_floor);
        Ok(state)
    }

    async fn resources_remaining(
        &mut self,
        stage: StageId,
        resource: &str,
    ) -> Result<f64, GuidanceError> {
        Ok(self.resources.get(&(stage, resource.to_string())).copied().unwrap_or(0.0))
    }

    async fn set_throttle(&mut self, fraction: f64) -> Result<(), GuidanceError> {
        self.check("set_throttle")?;
        self.commands.push(Command::Throttle(fraction));
        Ok(())
    }

    async fn set_attitude(&mut self, pitch_deg: f64, heading_deg: f64) -> Result<(), GuidanceError> {
        self.check("set_attitude")?;
        self.commands.push(Command::Attitude { pitch: pitch_deg, heading: heading_deg });
        Ok(())
    }

    async fn attitude_error(&mut self) -> Result<f64, GuidanceError> {
        Ok(self.attitude_error)
    }

    async fn engage_autopilot(&mut self) -> Result<(), GuidanceError> {
        self.commands.push(Command::EngageAutopilot);
        Ok(())
    }

    async fn disengage_autopilot(&mut self) -> Result<(), GuidanceError> {
        self.commands.push(Command::DisengageAutopilot);
        Ok(())
    }

    async fn activate_next_stage(&mut self) -> Result<(), GuidanceError> {
        self.check("activate_next_stage")?;
        self.commands.push(Command::ActivateStage);
        Ok(())
    }

    async fn create_maneuver(
        &mut self,
        epoch: f64,
        prograde_dv: f64,
    ) -> Result<ManeuverHandle, GuidanceError> {
        self.check("create_maneuver")?;
        self.next_handle += 1;
        let handle = ManeuverHandle(self.next_handle);
        self.live_nodes.insert(handle);
        self.commands.push(Command::CreateManeuver { epoch, prograde_dv });
        Ok(handle)
    }

    async fn remove_maneuver(&mut self, handle: ManeuverHandle) -> Result<(), GuidanceError> {
        self.live_nodes.remove(&handle);
        self.commands.push(Command::RemoveManeuver(handle));
        Ok(())
    }

    async fn remaining_delta_v(&mut self, _handle: ManeuverHandle) -> Result<f64, GuidanceError> {
        Ok(self.remaining_dv)
    }

    async fn request_time_acceleration(&mut self, target_epoch: f64) -> Result<(), GuidanceError> {
        self.check("request_time_acceleration")?;
        self.ut_floor = self.ut_floor.max(target_epoch);
        self.commands.push(Command::TimeAcceleration(target_epoch));
        Ok(())
    }
}
