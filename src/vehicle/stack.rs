use super::stage::{Stage, StageBuilder};

/// Stages ordered bottom (first to burn) to top.
#[derive(Debug, Clone)]
pub struct Stack {
    pub name: String,
    pub stages: Vec<Stage>,
}

impl Stack {
    pub fn total_mass(&self) -> f64 {
        self.stages.iter().map(|s| s.total_mass()).sum()
    }

    /// Mass riding on top of stage `index`.
    pub fn payload_above(&self, index: usize) -> f64 {
        self.stages.iter().skip(index + 1).map(Stage::total_mass).sum()
    }

    /// Ideal delta-v, each stage flying everything above it as payload.
    pub fn total_delta_v(&self) -> f64 {
        self.stages
            .iter()
            .enumerate()
            .map(|(i, stage)| stage.delta_v(self.payload_above(i)))
            .sum()
    }
}

#[derive(Debug)]
pub struct StackBuilder {
    name: String,
    stages: Vec<Stage>,
}

impl StackBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), stages: vec![] }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Stack {
        Stack { name: self.name, stages: self.stages }
    }
}

// ---------------------------------------------------------------------------
// Preset stacks
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;

    /// Four-stage Kerbin orbiter. Decouple ids 9, 7, 5, 3 from the bottom up,
    /// matching the default staging profile plus an orbit stage.
    pub fn kerbin_four_stage() -> Stack {
        StackBuilder::new("Kerbin Orbiter")
            .stage(
                StageBuilder::new("Booster", 9)
                    .tanks(6_000.0, 40_000.0)
                    .engine(1_200_000.0, 280.0)
                    .aero(0.3, 3.0)
                    .build(),
            )
            .stage(
                StageBuilder::new("Sustainer", 7)
                    .tanks(3_000.0, 15_000.0)
                    .engine(500_000.0, 300.0)
                    .aero(0.3, 2.5)
                    .build(),
            )
            .stage(
                StageBuilder::new("Upper", 5)
                    .tanks(1_500.0, 6_000.0)
                    .engine(200_000.0, 320.0)
                    .aero(0.3, 1.5)
                    .build(),
            )
            .stage(
                StageBuilder::new("Orbiter", 3)
                    .tanks(1_000.0, 2_000.0)
                    .engine(60_000.0, 345.0)
                    .aero(0.25, 1.0)
                    .build(),
            )
            .build()
    }
}
