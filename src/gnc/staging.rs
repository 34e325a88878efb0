use std::collections::HashSet;

use crate::config::{StageProfile, StagingConfig};
use crate::events::SeparationTrigger;
use crate::telemetry::{StageId, VehicleState};

// ---------------------------------------------------------------------------
// Staging state machine
// ---------------------------------------------------------------------------

/// Where the ascent stack is in its configured stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    /// Index into the configured profiles.
    Active(usize),
    AscentComplete,
}

/// A separation that has been decided but not yet fully actuated.
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationOrder {
    pub from: StageId,
    pub to: Option<StageId>,
    pub trigger: SeparationTrigger,
    pub commands: u32,
    pub commands_sent: u32,
}

impl SeparationOrder {
    pub fn commands_left(&self) -> u32 {
        self.commands.saturating_sub(self.commands_sent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StagingDecision {
    Hold,
    Separate(SeparationOrder),
}

/// Result of a committed separation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTransition {
    pub from: StageId,
    pub to: Option<StageId>,
    pub trigger: SeparationTrigger,
    pub throttle: Option<f64>,
}

/// Level-triggered stage sequencer: every tick re-checks the active stage
/// against its propellant threshold and altitude ceiling.
#[derive(Debug, Clone)]
pub struct StagingMachine {
    profiles: Vec<StageProfile>,
    threshold: f64,
    phase: StagePhase,
    separated: HashSet<StageId>,
    pending: Option<SeparationOrder>,
    throttle: f64,
}

impl StagingMachine {
    pub fn new(config: &StagingConfig, initial_throttle: f64) -> Self {
        let phase = if config.stages.is_empty() {
            StagePhase::AscentComplete
        } else {
            StagePhase::Active(0)
        };
        Self {
            profiles: config.stages.clone(),
            threshold: config.propellant_threshold,
            phase,
            separated: HashSet::new(),
            pending: None,
            throttle: initial_throttle,
        }
    }

    pub fn phase(&self) -> StagePhase {
        self.phase
    }

    pub fn active_stage(&self) -> Option<StageId> {
        self.active_profile().map(|p| p.id)
    }

    pub fn active_profile(&self) -> Option<&StageProfile> {
        match self.phase {
            StagePhase::Active(i) => self.profiles.get(i),
            StagePhase::AscentComplete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == StagePhase::AscentComplete
    }

    pub fn is_separated(&self, stage: StageId) -> bool {
        self.separated.contains(&stage)
    }

    pub fn separated_count(&self) -> usize {
        self.separated.len()
    }

    /// Throttle setpoint the vehicle should be flying at.
    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    /// Stages whose propellant must be in the snapshot for this tick.
    pub fn watched(&self) -> Vec<StageId> {
        self.active_profile()
            .filter(|p| p.propellant_cutoff)
            .map(|p| vec![p.id])
            .unwrap_or_default()
    }

    /// Decide whether the active stage must go. A half-actuated separation
    /// is always resumed before anything else is looked at.
    pub fn evaluate(&mut self, state: &VehicleState) -> StagingDecision {
        if let Some(order) = &self.pending {
            return StagingDecision::Separate(order.clone());
        }
        let StagePhase::Active(idx) = self.phase else {
            return StagingDecision::Hold;
        };
        let profile = &self.profiles[idx];
        if self.separated.contains(&profile.id) {
            return StagingDecision::Hold;
        }

        let trigger = self.trigger_for(profile, state);
        let Some(trigger) = trigger else {
            return StagingDecision::Hold;
        };

        let order = SeparationOrder {
            from: profile.id,
            to: self.profiles.get(idx + 1).map(|p| p.id),
            trigger,
            commands: profile.separation_commands,
            commands_sent: 0,
        };
        self.pending = Some(order.clone());
        StagingDecision::Separate(order)
    }

    fn trigger_for(&self, profile: &StageProfile, state: &VehicleState) -> Option<SeparationTrigger> {
        if profile.propellant_cutoff {
            // No reading means no decision; the check repeats next tick.
            if let Some(remaining) = state.propellant(profile.id) {
                if remaining < self.threshold {
                    return Some(SeparationTrigger::PropellantDepleted { remaining });
                }
            }
        }
        match profile.altitude_ceiling {
            Some(ceiling) if state.altitude >= ceiling => {
                Some(SeparationTrigger::AltitudeCeiling { altitude: state.altitude })
            }
            _ => None,
        }
    }

    /// Count one accepted staging command of the pending separation.
    pub fn command_sent(&mut self) {
        if let Some(order) = &mut self.pending {
            order.commands_sent += 1;
        }
    }

    /// Finish the pending separation: mark the stage, advance, apply the
    /// post-separation throttle. `None` if nothing was pending.
    pub fn commit(&mut self) -> Option<StageTransition> {
        let order = self.pending.take()?;
        let StagePhase::Active(idx) = self.phase else {
            return None;
        };
        let inserted = self.separated.insert(order.from);
        debug_assert!(inserted, "stage {} separated twice", order.from);

        let throttle = self.profiles[idx].post_separation_throttle;
        if let Some(t) = throttle {
            self.throttle = t;
        }
        self.phase = if idx + 1 < self.profiles.len() {
            StagePhase::Active(idx + 1)
        } else {
            StagePhase::AscentComplete
        };
        Some(StageTransition { from: order.from, to: order.to, trigger: order.trigger, throttle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(alt: f64, stage: u32, fuel: f64) -> VehicleState {
        let mut s = VehicleState { altitude: alt, ..Default::default() };
        s.propellant.insert(StageId(stage), fuel);
        s
    }

    fn run_to_commit(m: &mut StagingMachine, s: &VehicleState) -> StageTransition {
        match m.evaluate(s) {
            StagingDecision::Separate(order) => {
                for _ in 0..order.commands_left() {
                    m.command_sent();
                }
                m.commit().unwrap()
            }
            StagingDecision::Hold => panic!("expected separation"),
        }
    }

    #[test]
    fn holds_with_propellant() {
        let mut m = StagingMachine::new(&StagingConfig::default(), 1.0);
        assert_eq!(m.evaluate(&state(1000.0, 9, 500.0)), StagingDecision::Hold);
        assert_eq!(m.active_stage(), Some(StageId(9)));
    }

    #[test]
    fn missing_reading_holds() {
        let mut m = StagingMachine::new(&StagingConfig::default(), 1.0);
        let s = VehicleState { altitude: 1000.0, ..Default::default() };
        assert_eq!(m.evaluate(&s), StagingDecision::Hold);
    }

    #[test]
    fn depletion_separates_once() {
        let mut m = StagingMachine::new(&StagingConfig::default(), 1.0);
        let t = run_to_commit(&mut m, &state(20_000.0, 9, 0.05));
        assert_eq!(t.from, StageId(9));
        assert_eq!(t.to, Some(StageId(7)));
        assert!(m.is_separated(StageId(9)));
        assert_eq!(m.active_stage(), Some(StageId(7)));
        // the old stage's empty reading no longer matters
        assert_eq!(m.evaluate(&state(20_100.0, 9, 0.0)), StagingDecision::Hold);
        assert_eq!(m.separated_count(), 1);
    }

    #[test]
    fn ceiling_backup_trigger_and_throttle() {
        let mut m = StagingMachine::new(&StagingConfig::default(), 1.0);
        run_to_commit(&mut m, &state(20_000.0, 9, 0.0));
        let t = run_to_commit(&mut m, &state(69_000.0, 7, 800.0));
        assert!(matches!(t.trigger, SeparationTrigger::AltitudeCeiling { .. }));
        assert_eq!(t.throttle, Some(0.7));
        assert!((m.throttle() - 0.7).abs() < 1e-12);
        assert_eq!(m.active_stage(), Some(StageId(5)));
    }

    #[test]
    fn passive_stage_never_separates() {
        let mut m = StagingMachine::new(&StagingConfig::default(), 1.0);
        run_to_commit(&mut m, &state(20_000.0, 9, 0.0));
        run_to_commit(&mut m, &state(69_500.0, 7, 0.0));
        assert!(m.watched().is_empty());
        assert_eq!(m.evaluate(&state(140_000.0, 5, 0.0)), StagingDecision::Hold);
        assert!(!m.is_complete());
    }

    #[test]
    fn pending_order_resumes() {
        let mut m = StagingMachine::new(&StagingConfig::default(), 1.0);
        let s = state(20_000.0, 9, 0.0);
        let StagingDecision::Separate(first) = m.evaluate(&s) else { panic!() };
        assert_eq!(first.commands_left(), 2);
        m.command_sent();
        let StagingDecision::Separate(again) = m.evaluate(&s) else { panic!() };
        assert_eq!(again.commands_left(), 1);
        assert_eq!(again.from, StageId(9));
    }

    #[test]
    fn sequence_follows_configuration() {
        let config = StagingConfig {
            stages: vec![
                StageProfile::new(6, "A"),
                StageProfile::new(4, "B"),
                StageProfile::new(2, "C"),
            ],
            ..Default::default()
        };
        let mut m = StagingMachine::new(&config, 1.0);
        let mut seen = vec![];
        for id in [6, 4, 2] {
            // offer every stage empty at once; only the active one may go
            let mut s = VehicleState::default();
            for other in [6, 4, 2] {
                s.propellant.insert(StageId(other), 0.0);
            }
            let t = run_to_commit(&mut m, &s);
            assert_eq!(t.from, StageId(id));
            seen.push(t.from);
        }
        assert_eq!(seen, vec![StageId(6), StageId(4), StageId(2)]);
        assert!(m.is_complete());
        assert_eq!(m.evaluate(&VehicleState::default()), StagingDecision::Hold);
        assert!(m.commit().is_none());
    }
}
