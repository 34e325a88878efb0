pub mod stack;
pub mod stage;

pub use stack::{presets, Stack, StackBuilder};
pub use stage::{Stage, StageBuilder};
