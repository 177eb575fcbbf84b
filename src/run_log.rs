use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    num::NonZeroUsize,
    path::Path,
};

use serde::Serialize;

use crate::{
    Result,
    config::{
        DatasetConfig, EvalConfig, GanConfig, GanVariant, OptimizerConfig, SamplingConfig, Split,
    },
    gan::IMAGE_PIXELS,
    training::EpochStats,
};

/// What the log keeps of a dataset: where it lives, never its pixels.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DatasetSummary<'a> {
    Idx { base_path: &'a Path, split: Split },
    Inline { images: usize },
}

impl<'a> From<&'a DatasetConfig> for DatasetSummary<'a> {
    fn from(dataset: &'a DatasetConfig) -> Self {
        match dataset {
            DatasetConfig::Idx { base_path, split } => Self::Idx {
                base_path,
                split: *split,
            },
            DatasetConfig::Inline { data } => Self::Inline {
                images: data.len() / IMAGE_PIXELS,
            },
        }
    }
}

#[derive(Serialize)]
struct ConfigSummary<'a> {
    variant: &'a GanVariant,
    latent_dim: NonZeroUsize,
    batch_size: NonZeroUsize,
    epochs: NonZeroUsize,
    optimizer: &'a OptimizerConfig,
    dataset: DatasetSummary<'a>,
    sampling: &'a SamplingConfig,
    eval: &'a EvalConfig,
    seed: Option<u64>,
}

impl<'a> From<&'a GanConfig> for ConfigSummary<'a> {
    fn from(config: &'a GanConfig) -> Self {
        Self {
            variant: &config.variant,
            latent_dim: config.latent_dim,
            batch_size: config.batch_size,
            epochs: config.epochs,
            optimizer: &config.optimizer,
            dataset: (&config.dataset).into(),
            sampling: &config.sampling,
            eval: &config.eval,
            seed: config.seed,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Started {
        variant: &'a str,
        config: ConfigSummary<'a>,
    },
    Epoch(&'a EpochStats),
    Finished {
        epochs: usize,
    },
}

/// Append-only JSON lines record of a training run, never read back.
#[derive(Debug)]
pub struct RunLog {
    out: Option<BufWriter<File>>,
}

impl RunLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            out: Some(BufWriter::new(file)),
        })
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self { out: None }
    }

    pub fn started(&mut self, variant: &str, config: &GanConfig) -> Result<()> {
        self.append(&Event::Started {
            variant,
            config: config.into(),
        })
    }

    pub fn epoch(&mut self, stats: &EpochStats) -> Result<()> {
        self.append(&Event::Epoch(stats))
    }

    /// Records the end of the run and closes the log.
    pub fn finished(&mut self, epochs: usize) -> Result<()> {
        self.append(&Event::Finished { epochs })?;

        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }

        Ok(())
    }

    fn append(&mut self, event: &Event<'_>) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };

        serde_json::to_writer(&mut *out, event)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}
