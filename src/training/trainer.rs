use log::{debug, info, warn};
use machine_learning::{MlErr, arch::loss::AdversarialLoss, optimization::Optimizer};
use ndarray::{Array4, ArrayView2, ArrayView4, Axis, concatenate, s};
use rand::Rng;

use super::{EpochStats, StepStats};
use crate::{
    GanErr, Result,
    config::GanConfig,
    data::{DataLoader, SampleSource},
    gan::{Discriminator, Generator},
    run_log::RunLog,
    visualize::SampleSink,
};

/// A training run of a generator against a discriminator.
pub trait Trainer {
    /// The name of the adversarial objective.
    fn variant(&self) -> &'static str;

    /// Makes one discriminator update followed by one generator update on a batch of real
    /// images.
    fn step(&mut self, real: ArrayView4<f32>) -> Result<StepStats>;

    /// Trains for the configured amount of epochs.
    ///
    /// # Returns
    /// The mean losses of every epoch.
    fn train(&mut self) -> Result<Vec<EpochStats>>;

    fn generator(&self) -> &Generator;

    fn discriminator(&self) -> &Discriminator;
}

/// The training loop shared by every adversarial objective.
pub struct AdversarialTrainer<L, O, S, K, R>
where
    L: AdversarialLoss,
    O: Optimizer,
    S: SampleSource,
    K: SampleSink,
    R: Rng,
{
    generator: Generator,
    discriminator: Discriminator,
    g_optimizer: O,
    d_optimizer: O,
    loss: L,
    loader: DataLoader<S>,
    sink: K,
    run_log: RunLog,
    config: GanConfig,
    rng: R,

    // Where the loop currently is, (epoch, batch).
    position: (usize, usize),
    last_fake: Option<Array4<f32>>,
}

impl<L, O, S, K, R> AdversarialTrainer<L, O, S, K, R>
where
    L: AdversarialLoss,
    O: Optimizer,
    S: SampleSource,
    K: SampleSink,
    R: Rng,
{
    /// Creates a new `AdversarialTrainer`.
    ///
    /// # Arguments
    /// * `generator` - The network producing fakes.
    /// * `discriminator` - The network scoring images.
    /// * `optimizers` - The generator's and the discriminator's optimizers, in that order.
    /// * `loss` - The adversarial objective.
    /// * `loader` - Where the real batches come from.
    /// * `sink` - Where the periodic samples go.
    /// * `run_log` - The record of the run.
    /// * `config` - The run's configuration, only epochs and sampling are read.
    /// * `rng` - The source of latents, interpolations and shuffles.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: Generator,
        discriminator: Discriminator,
        optimizers: (O, O),
        loss: L,
        loader: DataLoader<S>,
        sink: K,
        run_log: RunLog,
        config: GanConfig,
        rng: R,
    ) -> Self {
        let (g_optimizer, d_optimizer) = optimizers;

        Self {
            generator,
            discriminator,
            g_optimizer,
            d_optimizer,
            loss,
            loader,
            sink,
            run_log,
            config,
            rng,
            position: (0, 0),
            last_fake: None,
        }
    }

    /// The most recent fake batch.
    pub fn last_fake(&self) -> Option<&Array4<f32>> {
        self.last_fake.as_ref()
    }

    fn step(&mut self, real: ArrayView4<f32>) -> Result<StepStats> {
        let n = real.len_of(Axis(0));
        let z = self.generator.sample_latent(n, &mut self.rng);
        let fake = self.generator.generate(z.view())?;

        let d_loss = self.critic_step(real, fake.view())?;
        let g_loss = self.generator_step(z.view())?;

        Ok(StepStats { d_loss, g_loss })
    }

    fn critic_step(&mut self, real: ArrayView4<f32>, fake: ArrayView4<f32>) -> Result<f32> {
        let n = real.len_of(Axis(0));
        self.discriminator.store_mut().zero_grad();

        let both = concatenate(Axis(0), &[real, fake]).map_err(|_| MlErr::SizeMismatch {
            what: "fake batch",
            got: fake.len(),
            expected: real.len(),
        })?;
        let scores = self.discriminator.forward(both.view())?.insert_axis(Axis(1));
        let (real_scores, fake_scores) = (scores.slice(s![..n, ..]), scores.slice(s![n.., ..]));

        let mut d_loss = self.loss.critic_loss(real_scores, fake_scores);
        let (d_real, d_fake) = self.loss.critic_loss_prime(real_scores, fake_scores);
        let d_scores =
            concatenate(Axis(0), &[d_real.view(), d_fake.view()]).map_err(|_| {
                MlErr::SizeMismatch {
                    what: "critic loss derivative",
                    got: d_real.len() + d_fake.len(),
                    expected: scores.len(),
                }
            })?;
        self.discriminator.backward(d_scores.column(0))?;

        if let Some(lambda) = self.loss.gradient_penalty() {
            let interp = self.interpolate(real, fake);
            d_loss += self.discriminator.gradient_penalty(interp.view(), lambda)?;
        }

        self.check_finite("discriminator", d_loss)?;
        self.discriminator.store_mut().optimize(&mut self.d_optimizer)?;

        if let Some(clip) = self.loss.weight_clip() {
            self.discriminator.clip_weights(clip);
        }

        Ok(d_loss)
    }

    fn generator_step(&mut self, z: ArrayView2<f32>) -> Result<f32> {
        self.generator.store_mut().zero_grad();

        let fake = self.generator.forward(z)?;
        let scores = self.discriminator.forward(fake.view())?.insert_axis(Axis(1));

        let g_loss = self.loss.generator_loss(scores.view());
        self.check_finite("generator", g_loss)?;

        let d_scores = self.loss.generator_loss_prime(scores.view());
        let d_images = self.discriminator.backward(d_scores.column(0))?;
        self.generator.backward(d_images.view())?;
        self.generator.store_mut().optimize(&mut self.g_optimizer)?;

        self.last_fake = Some(fake);
        Ok(g_loss)
    }

    /// Mixes each real image with its fake counterpart, `ε·real + (1 - ε)·fake` with one
    /// `ε ~ U[0, 1)` per image.
    fn interpolate(&mut self, real: ArrayView4<f32>, fake: ArrayView4<f32>) -> Array4<f32> {
        let mut interp = fake.to_owned();

        for (mut mixed, real) in interp.outer_iter_mut().zip(real.outer_iter()) {
            let eps: f32 = self.rng.random();
            mixed.zip_mut_with(&real, |f, &r| *f = eps * r + (1. - eps) * *f);
        }

        interp
    }

    fn check_finite(&self, which: &'static str, value: f32) -> Result<()> {
        if value.is_finite() {
            return Ok(());
        }

        let (epoch, batch) = self.position;
        Err(GanErr::Divergence {
            epoch,
            batch,
            which,
            value,
        })
    }

    fn export_samples(&mut self, epoch: usize) {
        let Some(fake) = &self.last_fake else {
            return;
        };

        if let Err(e) = self.sink.export(fake.view(), self.loss.name(), epoch) {
            warn!("couldn't export the samples of epoch {epoch}: {e}");
        }
    }

    fn train(&mut self) -> Result<Vec<EpochStats>> {
        let variant = self.loss.name();
        let epochs = self.config.epochs.get();
        let sample_every = self.config.sampling.every.get();

        self.run_log.started(variant, &self.config)?;
        info!(
            "training {variant} for {epochs} epochs of {} batches",
            self.loader.num_batches()
        );

        let mut history = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            self.loader.shuffle(&mut self.rng);
            let mut steps = Vec::with_capacity(self.loader.num_batches());

            while let Some(real) = self.loader.next_batch() {
                let batch = steps.len();
                self.position = (epoch, batch);

                let stats = self.step(real.view())?;
                debug!(
                    epoch = epoch, batch = batch, d_loss = stats.d_loss, g_loss = stats.g_loss;
                    "step done"
                );
                steps.push(stats);
            }

            let stats = EpochStats::from_steps(epoch, &steps);
            info!(
                "[{variant}] epoch {}/{epochs}: d_loss {:.4}, g_loss {:.4}",
                epoch + 1,
                stats.d_loss,
                stats.g_loss
            );
            self.run_log.epoch(&stats)?;

            if epoch % sample_every == 0 {
                self.export_samples(epoch);
            }

            history.push(stats);
        }

        self.run_log.finished(history.len())?;
        Ok(history)
    }
}

impl<L, O, S, K, R> Trainer for AdversarialTrainer<L, O, S, K, R>
where
    L: AdversarialLoss,
    O: Optimizer,
    S: SampleSource,
    K: SampleSink,
    R: Rng,
{
    fn variant(&self) -> &'static str {
        self.loss.name()
    }

    fn step(&mut self, real: ArrayView4<f32>) -> Result<StepStats> {
        self.step(real)
    }

    fn train(&mut self) -> Result<Vec<EpochStats>> {
        self.train()
    }

    fn generator(&self) -> &Generator {
        &self.generator
    }

    fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }
}
