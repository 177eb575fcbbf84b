use serde::Serialize;

/// The losses of a single training step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepStats {
    pub d_loss: f32,
    pub g_loss: f32,
}

/// The mean losses of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub d_loss: f32,
    pub g_loss: f32,
    pub batches: usize,
}

impl EpochStats {
    /// Averages the steps of an epoch.
    pub fn from_steps(epoch: usize, steps: &[StepStats]) -> Self {
        let batches = steps.len();
        let n = batches.max(1) as f32;
        let (d_sum, g_sum) = steps
            .iter()
            .fold((0., 0.), |(d, g), s| (d + s.d_loss, g + s.g_loss));

        Self {
            epoch,
            d_loss: d_sum / n,
            g_loss: g_sum / n,
            batches,
        }
    }
}
