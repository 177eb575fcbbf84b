use std::{fs, num::NonZeroUsize};

use gan_trainer::{
    GanConfig, GanErr,
    config::{DatasetConfig, GanVariant},
    data::{DataLoader, InMemorySource, SampleSource},
    gan::{Discriminator, Generator, IMAGE_PIXELS, IMAGE_SIDE},
    run_log::RunLog,
    training::{AdversarialTrainer, Trainer, TrainerBuilder},
    visualize::NullSink,
};
use machine_learning::{
    arch::loss::{AdversarialLoss, Wasserstein, WassersteinGp},
    optimization::Adam,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const LATENT: usize = 100;
const BATCH: usize = 4;

fn pixels(images: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..images * IMAGE_PIXELS)
        .map(|_| rng.random_range(-1.0..=1.0))
        .collect()
}

fn config(variant: GanVariant, images: usize) -> GanConfig {
    let mut config = GanConfig {
        variant,
        latent_dim: NonZeroUsize::new(LATENT).unwrap(),
        batch_size: NonZeroUsize::new(BATCH).unwrap(),
        epochs: NonZeroUsize::new(1).unwrap(),
        dataset: DatasetConfig::Inline {
            data: pixels(images, 11),
        },
        seed: Some(42),
        ..GanConfig::default()
    };
    config.sampling.output_dir = None;
    config
}

fn trainer<L: AdversarialLoss>(
    loss: L,
    discriminator: Discriminator,
    images: usize,
) -> AdversarialTrainer<L, Adam, InMemorySource, NullSink, StdRng> {
    let mut rng = StdRng::seed_from_u64(5);
    let generator = Generator::new(LATENT, &mut rng);
    let adam = |len| Adam::new(len, 0.0002, 0.5, 0.999, 1e-8);
    let optimizers = (adam(generator.store().len()), adam(discriminator.store().len()));

    let source = InMemorySource::new(pixels(images, 3), (IMAGE_SIDE, IMAGE_SIDE)).unwrap();
    let loader = DataLoader::new(source, NonZeroUsize::new(BATCH).unwrap());

    AdversarialTrainer::new(
        generator,
        discriminator,
        optimizers,
        loss,
        loader,
        NullSink,
        RunLog::disabled(),
        config(GanVariant::LeastSquares, images),
        rng,
    )
}

/// A critic whose weights are all zero except the output bias, scoring every image with 1.
fn constant_critic() -> Discriminator {
    let mut params = vec![0.; Discriminator::num_params()];
    if let Some(bias) = params.last_mut() {
        *bias = 1.;
    }
    Discriminator::from_params(params).unwrap()
}

#[test]
fn lsgan_epoch_updates_both_networks() {
    let config = config(GanVariant::LeastSquares, 2 * BATCH);
    let mut trainer = TrainerBuilder::new().build(&config).unwrap();
    let g_before = trainer.generator().store().params().to_vec();
    let d_before = trainer.discriminator().store().params().to_vec();

    let history = trainer.train().unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].batches, 2);
    assert!(history[0].d_loss >= 0.);
    assert_ne!(trainer.generator().store().params(), g_before.as_slice());
    assert_ne!(trainer.discriminator().store().params(), d_before.as_slice());
}

#[test]
fn wgan_generator_loss_is_negative_against_a_positive_critic() {
    let mut trainer = trainer(Wasserstein::new(None), constant_critic(), BATCH);

    let source = InMemorySource::new(pixels(BATCH, 9), (IMAGE_SIDE, IMAGE_SIDE)).unwrap();
    let stats = Trainer::step(&mut trainer, source.head(BATCH).view()).unwrap();

    // Every gradient of the critic vanishes, so it keeps scoring 1.
    assert_eq!(stats.d_loss, 0.);
    assert!(stats.g_loss < 0.);
    assert_eq!(stats.g_loss, -1.);
}

#[test]
fn wgan_clipping_bounds_the_critic() {
    let mut rng = StdRng::seed_from_u64(8);
    let critic = Discriminator::new(&mut rng);
    let mut trainer = trainer(Wasserstein::new(Some(0.01)), critic, BATCH);

    let source = InMemorySource::new(pixels(BATCH, 1), (IMAGE_SIDE, IMAGE_SIDE)).unwrap();
    Trainer::step(&mut trainer, source.head(BATCH).view()).unwrap();

    assert!(
        trainer
            .discriminator()
            .store()
            .params()
            .iter()
            .all(|w| w.abs() <= 0.01)
    );
}

#[test]
fn wgan_gp_steps_stay_finite() {
    let mut rng = StdRng::seed_from_u64(4);
    let critic = Discriminator::new(&mut rng);
    let mut trainer = trainer(WassersteinGp::default(), critic, 2 * BATCH);

    let history = Trainer::train(&mut trainer).unwrap();

    assert_eq!(history[0].batches, 2);
    assert!(history[0].d_loss.is_finite());
    assert!(history[0].g_loss.is_finite());
    assert_eq!(trainer.last_fake().map(|f| f.dim()), Some((BATCH, 1, IMAGE_SIDE, IMAGE_SIDE)));
}

#[test]
fn non_finite_losses_abort_training() {
    let mut config = config(GanVariant::Wasserstein { clip: None }, BATCH);
    if let DatasetConfig::Inline { data } = &mut config.dataset {
        data[0] = f32::NAN;
    }

    let mut trainer = TrainerBuilder::new().build(&config).unwrap();
    let err = trainer.train().unwrap_err();

    match err {
        GanErr::Divergence {
            epoch,
            batch,
            which,
            value,
        } => {
            assert_eq!((epoch, batch, which), (0, 0, "discriminator"));
            assert!(value.is_nan());
        }
        other => panic!("expected a divergence, got {other}"),
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let config = config(GanVariant::WassersteinGp { lambda: 10. }, 2 * BATCH);

    let first = TrainerBuilder::new().build(&config).unwrap().train().unwrap();
    let second = TrainerBuilder::new().build(&config).unwrap().train().unwrap();

    assert_eq!(first, second);
}

#[test]
fn runs_leave_a_log_and_sample_grids() {
    let dir = std::env::temp_dir().join("gan-trainer-e2e-run");
    let _ = fs::remove_dir_all(&dir);

    let mut config = config(GanVariant::LeastSquares, BATCH);
    config.epochs = NonZeroUsize::new(2).unwrap();
    config.sampling.output_dir = Some(dir.join("samples"));
    config.run_log = Some(dir.join("run.jsonl"));
    fs::create_dir_all(&dir).unwrap();

    TrainerBuilder::new().build(&config).unwrap().train().unwrap();

    assert!(dir.join("samples").join("lsgan-epoch-000.pgm").is_file());
    assert!(!dir.join("samples").join("lsgan-epoch-001.pgm").exists());

    let log = fs::read_to_string(dir.join("run.jsonl")).unwrap();
    let events: Vec<serde_json::Value> = log
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let kinds: Vec<_> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["started", "epoch", "epoch", "finished"]);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn sources_hand_out_whole_images() {
    let source = InMemorySource::new(pixels(3, 2), (IMAGE_SIDE, IMAGE_SIDE)).unwrap();
    assert_eq!(source.len(), 3);
    assert_eq!(source.head(10).dim(), (3, 1, IMAGE_SIDE, IMAGE_SIDE));
}
