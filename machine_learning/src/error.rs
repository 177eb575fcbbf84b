use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    NotPiecewiseLinear {
        layer: usize,
    },
    MissingForward {
        layer: usize,
    },
    EmptyBatch,
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::NotPiecewiseLinear { layer } => write!(
                f,
                "The activation of layer {layer} is not piecewise linear, its input gradient can't be penalized"
            ),
            MlErr::MissingForward { layer } => write!(
                f,
                "Tried to go backwards through layer {layer} before making a forward pass"
            ),
            MlErr::EmptyBatch => write!(f, "The given batch has no rows"),
        }
    }
}

impl MlErr {
    /// Attaches the index of the layer that failed to layer scoped errors.
    pub(crate) fn at_layer(self, index: usize) -> Self {
        match self {
            MlErr::MissingForward { .. } => MlErr::MissingForward { layer: index },
            MlErr::NotPiecewiseLinear { .. } => MlErr::NotPiecewiseLinear { layer: index },
            other => other,
        }
    }
}

impl Error for MlErr {}
