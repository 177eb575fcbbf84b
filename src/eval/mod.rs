mod classifier;
mod fid;
mod inception;
mod prepare;

pub use classifier::{Classifier, ClassifierWeights, DenseClassifier, DenseWeights, FeatureExtractor};
pub use fid::{fid, frechet_distance};
pub use inception::{InceptionScore, inception_score, inception_score_from_preds, softmax};
pub use prepare::{prepare, resize_bilinear};

use log::info;
use ndarray::{Array4, ArrayView4, Axis, concatenate};
use rand::Rng;

use crate::{GanErr, Result, config::EvalConfig, gan::Generator};

/// The scores of a trained generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub inception: InceptionScore,
    pub fid: f64,
}

/// Scores generators with a pretrained classifier. Never touches any training state.
pub struct Evaluator<C> {
    classifier: C,
    config: EvalConfig,
}

impl<C: Classifier + FeatureExtractor> Evaluator<C> {
    /// Creates a new `Evaluator`.
    pub fn new(classifier: C, config: EvalConfig) -> Result<Self> {
        if config.splits == 0 || config.num_samples < config.splits {
            return Err(GanErr::InvalidConfig(format!(
                "can't split {} samples in {} groups",
                config.num_samples, config.splits
            )));
        }

        Ok(Self { classifier, config })
    }

    pub fn inception_score<R: Rng>(
        &self,
        generator: &Generator,
        rng: &mut R,
    ) -> Result<InceptionScore> {
        let EvalConfig {
            num_samples,
            batch_size,
            splits,
            ..
        } = self.config;

        inception_score(
            generator,
            &self.classifier,
            num_samples,
            batch_size.get(),
            splits,
            rng,
        )
    }

    /// Compares `real` with as many generated images.
    pub fn fid<R: Rng>(
        &self,
        generator: &Generator,
        real: ArrayView4<f32>,
        rng: &mut R,
    ) -> Result<f64> {
        let fake = self.generate(generator, real.len_of(Axis(0)), rng)?;
        fid(&self.classifier, real, fake.view())
    }

    /// Computes both scores, the FID against `real`.
    pub fn evaluate<R: Rng>(
        &self,
        generator: &Generator,
        real: ArrayView4<f32>,
        rng: &mut R,
    ) -> Result<EvalReport> {
        let inception = self.inception_score(generator, rng)?;
        let fid = self.fid(generator, real, rng)?;

        info!(
            "inception score {:.4} ± {:.4}, fid {fid:.4}",
            inception.mean, inception.std
        );
        Ok(EvalReport { inception, fid })
    }

    fn generate<R: Rng>(&self, generator: &Generator, n: usize, rng: &mut R) -> Result<Array4<f32>> {
        let batch_size = self.config.batch_size.get();
        let mut batches = Vec::with_capacity(n.div_ceil(batch_size));
        let mut remaining = n;

        while remaining > 0 {
            let size = remaining.min(batch_size);
            batches.push(generator.sample(size, rng)?);
            remaining -= size;
        }

        let views: Vec<_> = batches.iter().map(|b| b.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| GanErr::InvalidConfig(e.to_string()))
    }
}
