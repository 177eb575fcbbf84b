use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;

/// The trainer's result type.
pub type Result<T> = std::result::Result<T, GanErr>;

/// Everything that can go wrong while setting up, running or evaluating a training.
#[derive(Debug)]
pub enum GanErr {
    /// A numerical operation received inputs of the wrong shape.
    Ml(MlErr),
    Io(io::Error),
    Json(serde_json::Error),
    /// Invalid configuration, caught before training starts.
    InvalidConfig(String),
    /// The dataset files are missing or unreadable.
    DatasetUnavailable { path: PathBuf, reason: String },
    /// A loss stopped being a finite number.
    Divergence {
        epoch: usize,
        batch: usize,
        which: &'static str,
        value: f32,
    },
    /// The classifier used for evaluation failed.
    Classifier(String),
}

impl fmt::Display for GanErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GanErr::Ml(e) => write!(f, "model error: {e}"),
            GanErr::Io(e) => write!(f, "io error: {e}"),
            GanErr::Json(e) => write!(f, "json error: {e}"),
            GanErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            GanErr::DatasetUnavailable { path, reason } => {
                write!(f, "dataset unavailable at {}: {reason}", path.display())
            }
            GanErr::Divergence {
                epoch,
                batch,
                which,
                value,
            } => write!(
                f,
                "{which} loss diverged to {value} at epoch {epoch}, batch {batch}"
            ),
            GanErr::Classifier(msg) => write!(f, "classifier error: {msg}"),
        }
    }
}

impl Error for GanErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GanErr::Ml(e) => Some(e),
            GanErr::Io(e) => Some(e),
            GanErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for GanErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<io::Error> for GanErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for GanErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
