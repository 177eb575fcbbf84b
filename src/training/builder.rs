use machine_learning::{
    arch::loss::{AdversarialLoss, LeastSquares, Wasserstein, WassersteinGp},
    optimization::Adam,
};

use super::{AdversarialTrainer, Trainer};
use crate::{
    GanErr, Result,
    config::{DatasetConfig, GanConfig, GanVariant},
    data::{DataLoader, IdxSource, InMemorySource, SampleSource},
    gan::{Discriminator, Generator, IMAGE_SIDE},
    run_log::RunLog,
    visualize::{GridWriter, NullSink, SampleSink},
};

/// Builds `Trainer`s given a configuration.
#[derive(Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Trainer` following a configuration, loading its dataset.
    ///
    /// # Arguments
    /// * `config` - The configuration of the run.
    ///
    /// # Returns
    /// The trainer or the setup failure that prevents it from running.
    pub fn build(&self, config: &GanConfig) -> Result<Box<dyn Trainer>> {
        config.validate()?;
        let source = self.load_source(&config.dataset)?;
        self.build_with_source(config, source)
    }

    /// Builds a new `Trainer` over an already loaded dataset.
    pub fn build_with_source(
        &self,
        config: &GanConfig,
        source: Box<dyn SampleSource>,
    ) -> Result<Box<dyn Trainer>> {
        config.validate()?;

        if source.image_shape() != (IMAGE_SIDE, IMAGE_SIDE) || source.is_empty() {
            let (h, w) = source.image_shape();
            return Err(GanErr::InvalidConfig(format!(
                "expected a non empty dataset of {IMAGE_SIDE}x{IMAGE_SIDE} images, got {} of {h}x{w}",
                source.len()
            )));
        }

        self.resolve_loss(config, source)
    }

    /// Loads the configured dataset.
    pub fn load_source(&self, config: &DatasetConfig) -> Result<Box<dyn SampleSource>> {
        let source: Box<dyn SampleSource> = match config {
            DatasetConfig::Idx { base_path, split } => Box::new(IdxSource::open(base_path, *split)?),
            DatasetConfig::Inline { data } => {
                Box::new(InMemorySource::new(data.clone(), (IMAGE_SIDE, IMAGE_SIDE))?)
            }
        };

        Ok(source)
    }

    fn resolve_loss(
        &self,
        config: &GanConfig,
        source: Box<dyn SampleSource>,
    ) -> Result<Box<dyn Trainer>> {
        match config.variant {
            GanVariant::LeastSquares => self.terminate_build(config, source, LeastSquares::new()),
            GanVariant::Wasserstein { clip } => {
                self.terminate_build(config, source, Wasserstein::new(clip))
            }
            GanVariant::WassersteinGp { lambda } => {
                self.terminate_build(config, source, WassersteinGp::new(lambda))
            }
        }
    }

    fn resolve_sink(&self, config: &GanConfig) -> Result<Box<dyn SampleSink>> {
        let sink: Box<dyn SampleSink> = match &config.sampling.output_dir {
            Some(dir) => Box::new(GridWriter::new(dir, config.sampling.grid_images.get())?),
            None => Box::new(NullSink),
        };

        Ok(sink)
    }

    fn terminate_build<L>(
        &self,
        config: &GanConfig,
        source: Box<dyn SampleSource>,
        loss: L,
    ) -> Result<Box<dyn Trainer>>
    where
        L: AdversarialLoss + 'static,
    {
        let sink = self.resolve_sink(config)?;
        let run_log = match &config.run_log {
            Some(path) => RunLog::create(path)?,
            None => RunLog::disabled(),
        };

        let mut rng = config.rng();
        let generator = Generator::new(config.latent_dim.get(), &mut rng);
        let discriminator = Discriminator::new(&mut rng);

        let opt = config.optimizer;
        let adam = |len| Adam::new(len, opt.lr, opt.beta1, opt.beta2, opt.eps);
        let optimizers = (
            adam(generator.store().len()),
            adam(discriminator.store().len()),
        );

        let loader = DataLoader::new(source, config.batch_size);

        let trainer = AdversarialTrainer::new(
            generator,
            discriminator,
            optimizers,
            loss,
            loader,
            sink,
            run_log,
            config.clone(),
            rng,
        );

        Ok(Box::new(trainer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gan::IMAGE_PIXELS;

    fn inline_config(images: usize) -> GanConfig {
        GanConfig {
            dataset: DatasetConfig::Inline {
                data: vec![0.; images * IMAGE_PIXELS],
            },
            ..GanConfig::default()
        }
    }

    #[test]
    fn every_variant_resolves_to_its_objective() {
        let variants = [
            (GanVariant::LeastSquares, "lsgan"),
            (GanVariant::Wasserstein { clip: Some(0.01) }, "wgan"),
            (GanVariant::WassersteinGp { lambda: 10. }, "wgan-gp"),
        ];

        for (variant, name) in variants {
            let mut config = inline_config(2);
            config.variant = variant;
            config.sampling.output_dir = None;

            let trainer = TrainerBuilder::new().build(&config).unwrap();
            assert_eq!(trainer.variant(), name);
        }
    }

    #[test]
    fn missing_dataset_fails_before_training() {
        let mut config = GanConfig::default();
        config.dataset = DatasetConfig::Idx {
            base_path: std::env::temp_dir().join("gan-trainer-builder-no-dataset"),
            split: Default::default(),
        };

        let err = TrainerBuilder::new().build(&config).err().unwrap();
        assert!(matches!(err, GanErr::DatasetUnavailable { .. }));
    }

    #[test]
    fn images_of_another_size_are_rejected() {
        let source = InMemorySource::new(vec![0.; 32], (4, 4)).unwrap();

        let err = TrainerBuilder::new()
            .build_with_source(&GanConfig::default(), Box::new(source))
            .err()
            .unwrap();
        assert!(matches!(err, GanErr::InvalidConfig(_)));
    }
}
