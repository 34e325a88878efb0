use serde::Serialize;

use crate::orbital::planner::PlannerPhase;
use crate::telemetry::StageId;

// ---------------------------------------------------------------------------
// Mission events
// ---------------------------------------------------------------------------

/// Why the powered ascent ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AscentEnd {
    GuardTrip,
    StagesExhausted,
}

/// What set off a stage separation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SeparationTrigger {
    PropellantDepleted { remaining: f64 },
    AltitudeCeiling { altitude: f64 },
}

/// Kinds of mission events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum EventKind {
    Liftoff,
    StageSeparated { from: StageId, to: Option<StageId>, trigger: SeparationTrigger },
    GuardTripped { apoapsis: f64, limit: f64 },
    AscentComplete { reason: AscentEnd, total_dv: f64 },
    OrbitStageReleased,
    ManeuverPlanned { prograde_dv: f64, epoch: f64, burn_time: f64 },
    ConvergenceWarning { phase: PlannerPhase, waited: f64 },
    BurnStarted { throttle: f64 },
    BurnCompleted { remaining_dv: f64 },
    MissionComplete { total_dv: f64, apoapsis: f64, periapsis: f64 },
}

impl EventKind {
    pub fn is_warning(&self) -> bool {
        matches!(self, EventKind::GuardTripped { .. } | EventKind::ConvergenceWarning { .. })
    }
}

/// A discrete event stamped with the vehicle's universal time.
#[derive(Debug, Clone, Serialize)]
pub struct MissionEvent {
    pub ut: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Ordered record of everything that happened; each entry is also logged.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EventLog {
    events: Vec<MissionEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, ut: f64, kind: EventKind) {
        if kind.is_warning() {
            log::warn!("[ut={ut:.1}] {kind:?}");
        } else {
            log::info!("[ut={ut:.1}] {kind:?}");
        }
        self.events.push(MissionEvent { ut, kind });
    }

    pub fn events(&self) -> &[MissionEvent] {
        &self.events
    }

    pub fn kinds(&self) -> impl Iterator<Item = &EventKind> {
        self.events.iter().map(|e| &e.kind)
    }

    /// Stage ids in the order they were separated.
    pub fn separations(&self) -> Vec<StageId> {
        self.kinds()
            .filter_map(|k| match k {
                EventKind::StageSeparated { from, .. } => Some(*from),
                _ => None,
            })
            .collect()
    }
}
