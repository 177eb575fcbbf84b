mod builder;
mod stats;
mod trainer;

pub use builder::TrainerBuilder;
pub use stats::{EpochStats, StepStats};
pub use trainer::{AdversarialTrainer, Trainer};
