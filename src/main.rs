use std::env;

use anyhow::Context;
use log::{error, info};

use gan_trainer::{
    GanConfig,
    eval::{DenseClassifier, Evaluator},
    training::TrainerBuilder,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => {
            GanConfig::from_path(&path).with_context(|| format!("loading config from {path}"))?
        }
        None => {
            let config = GanConfig::default();
            config.validate()?;
            config
        }
    };

    let builder = TrainerBuilder::new();
    let source = builder.load_source(&config.dataset)?;

    let evaluator = match &config.eval.classifier {
        Some(path) => {
            let classifier = DenseClassifier::from_path(path)
                .with_context(|| format!("loading classifier from {}", path.display()))?;
            Some(Evaluator::new(classifier, config.eval.clone())?)
        }
        None => None,
    };
    let real = evaluator
        .as_ref()
        .map(|_| source.head(config.eval.num_samples));

    let mut trainer = builder.build_with_source(&config, source)?;
    let history = trainer.train()?;

    if let Some(last) = history.last() {
        info!(
            "{} finished after {} epochs, d_loss {:.4}, g_loss {:.4}",
            trainer.variant(),
            history.len(),
            last.d_loss,
            last.g_loss
        );
    }

    if let (Some(evaluator), Some(real)) = (evaluator, real) {
        let mut rng = config.rng();

        match evaluator.evaluate(trainer.generator(), real.view(), &mut rng) {
            Ok(report) => println!(
                "IS: {:.4} ± {:.4}\nFID: {:.4}",
                report.inception.mean, report.inception.std, report.fid
            ),
            Err(e) => error!("evaluation failed: {e}"),
        }
    }

    Ok(())
}
