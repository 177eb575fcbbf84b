use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{GanErr, Result};

const DEFAULT_LATENT_DIM: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();
const DEFAULT_EPOCHS: NonZeroUsize = NonZeroUsize::new(50).unwrap();
const DEFAULT_SAMPLE_EVERY: NonZeroUsize = NonZeroUsize::new(5).unwrap();
const DEFAULT_GRID_IMAGES: NonZeroUsize = NonZeroUsize::new(16).unwrap();
const DEFAULT_EVAL_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(32).unwrap();

/// The adversarial objective to train with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GanVariant {
    #[default]
    LeastSquares,
    /// `clip` bounds the critic's parameters after every update when set.
    Wasserstein {
        #[serde(default)]
        clip: Option<f32>,
    },
    WassersteinGp {
        #[serde(default = "default_lambda")]
        lambda: f32,
    },
}

fn default_lambda() -> f32 {
    10.
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            lr: 0.0002,
            beta1: 0.5,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Train,
    Test,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// IDX image and label files in `base_path`.
    Idx {
        base_path: PathBuf,
        #[serde(default)]
        split: Split,
    },
    /// Row major images already normalized to `[-1, 1]`.
    Inline { data: Vec<f32> },
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::Idx {
            base_path: PathBuf::from("data"),
            split: Split::Train,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Samples are exported on every epoch divisible by this.
    pub every: NonZeroUsize,
    /// How many images of the last fake batch go into the grid.
    pub grid_images: NonZeroUsize,
    /// Where grids are written, nothing is written when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            every: DEFAULT_SAMPLE_EVERY,
            grid_images: DEFAULT_GRID_IMAGES,
            output_dir: Some(PathBuf::from("samples")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// JSON weights of the pretrained classifier.
    pub classifier: Option<PathBuf>,
    pub num_samples: usize,
    pub batch_size: NonZeroUsize,
    pub splits: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            classifier: None,
            num_samples: 1000,
            batch_size: DEFAULT_EVAL_BATCH_SIZE,
            splits: 10,
        }
    }
}

/// Everything a training run needs to know, built once and handed down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GanConfig {
    pub variant: GanVariant,
    pub latent_dim: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub epochs: NonZeroUsize,
    pub optimizer: OptimizerConfig,
    pub dataset: DatasetConfig,
    pub sampling: SamplingConfig,
    pub eval: EvalConfig,
    /// Append-only JSON lines log of the run.
    pub run_log: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for GanConfig {
    fn default() -> Self {
        Self {
            variant: GanVariant::default(),
            latent_dim: DEFAULT_LATENT_DIM,
            batch_size: DEFAULT_BATCH_SIZE,
            epochs: DEFAULT_EPOCHS,
            optimizer: OptimizerConfig::default(),
            dataset: DatasetConfig::default(),
            sampling: SamplingConfig::default(),
            eval: EvalConfig::default(),
            run_log: None,
            seed: None,
        }
    }
}

impl GanConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that can't produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(GanErr::InvalidConfig(msg));
        let OptimizerConfig {
            lr,
            beta1,
            beta2,
            eps,
        } = self.optimizer;

        if !(lr.is_finite() && lr > 0.) {
            return invalid(format!("learning rate must be positive, got {lr}"));
        }

        for (name, beta) in [("beta1", beta1), ("beta2", beta2)] {
            if !(0. ..1.).contains(&beta) {
                return invalid(format!("{name} must be in [0, 1), got {beta}"));
            }
        }

        if !(eps.is_finite() && eps > 0.) {
            return invalid(format!("eps must be positive, got {eps}"));
        }

        match self.variant {
            GanVariant::Wasserstein { clip: Some(clip) } if !(clip.is_finite() && clip > 0.) => {
                return invalid(format!("clip must be positive, got {clip}"));
            }
            GanVariant::WassersteinGp { lambda } if !(lambda.is_finite() && lambda >= 0.) => {
                return invalid(format!("lambda must be non negative, got {lambda}"));
            }
            _ => {}
        }

        if let DatasetConfig::Inline { data } = &self.dataset {
            let pixels = crate::gan::IMAGE_PIXELS;
            if data.is_empty() || data.len() % pixels != 0 {
                return invalid(format!(
                    "inline dataset length ({}) is not a positive multiple of {pixels}",
                    data.len()
                ));
            }
        }

        if self.eval.splits == 0 {
            return invalid("eval splits must be greater than 0".into());
        }

        if self.eval.num_samples < self.eval.splits {
            return invalid(format!(
                "eval num_samples ({}) must be at least the amount of splits ({})",
                self.eval.num_samples, self.eval.splits
            ));
        }

        Ok(())
    }

    /// Creates the run's random number generator, seeded when a seed is configured.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
