pub mod controller;
pub mod delta_v;
pub mod guidance;
pub mod staging;
pub mod throttle;

pub use controller::{AscentController, AscentOutcome, TickOutcome, TraceSample};
pub use delta_v::DeltaVTracker;
pub use guidance::{target_pitch, PitchCommander};
pub use staging::{StagePhase, StagingDecision, StagingMachine};
pub use throttle::{advisory_throttle, ApoapsisGuard};
