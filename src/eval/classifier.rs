use std::{fs, path::Path};

use machine_learning::arch::{Sequential, activations::ActFn, layers::Layer};
use ndarray::{Array2, ArrayView4};
use serde::{Deserialize, Serialize};

use crate::{GanErr, Result, gan::flatten};

/// A pretrained image classifier used in evaluation mode.
pub trait Classifier {
    /// The height and width the classifier expects.
    fn input_size(&self) -> (usize, usize);

    /// Computes the unnormalized class scores of `(N, 3, H, W)` images.
    fn logits(&self, images: ArrayView4<f32>) -> Result<Array2<f32>>;
}

/// Maps images to the feature vectors their distributions are compared on.
pub trait FeatureExtractor {
    /// The height and width the extractor expects.
    fn input_size(&self) -> (usize, usize);

    /// Computes one feature vector per `(N, 3, H, W)` image.
    fn features(&self, images: ArrayView4<f32>) -> Result<Array2<f32>>;
}

/// The weights of one dense layer, `weights` has one row per input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseWeights {
    pub weights: Vec<Vec<f32>>,
    pub biases: Vec<f32>,
}

/// The on-disk format of a `DenseClassifier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierWeights {
    pub input_size: (usize, usize),
    pub layers: Vec<DenseWeights>,
}

/// A fully connected classifier with ReLU hidden layers.
///
/// Its logits are the output of the last layer and its features the activations of the
/// penultimate one.
#[derive(Debug, Clone)]
pub struct DenseClassifier {
    input_size: (usize, usize),
    model: Sequential,
    params: Vec<f32>,
}

impl DenseClassifier {
    /// Loads a classifier from a JSON weights file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let weights: ClassifierWeights = serde_json::from_str(&raw)?;
        Self::from_weights(weights)
    }

    /// Creates a classifier checking every layer fits the previous one.
    pub fn from_weights(spec: ClassifierWeights) -> Result<Self> {
        let (h, w) = spec.input_size;
        let nlayers = spec.layers.len();

        if nlayers < 2 {
            return Err(GanErr::Classifier(format!(
                "expected a hidden layer and an output layer, got {nlayers} layers"
            )));
        }

        let mut layers = Vec::with_capacity(nlayers);
        let mut params = Vec::new();
        let mut width = 3 * h * w;

        for (i, DenseWeights { weights, biases }) in spec.layers.into_iter().enumerate() {
            let out = biases.len();

            if weights.len() != width || weights.iter().any(|row| row.len() != out) {
                return Err(GanErr::Classifier(format!(
                    "layer {i} weights aren't {width}x{out}"
                )));
            }

            let act_fn = (i + 1 < nlayers).then(ActFn::relu);
            layers.push(Layer::dense((width, out), act_fn));
            params.extend(weights.into_iter().flatten());
            params.extend(biases);
            width = out;
        }

        Ok(Self {
            input_size: spec.input_size,
            model: Sequential::new(layers),
            params,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.model.output_width()
    }

    fn infer_until(&self, images: ArrayView4<f32>, depth: usize) -> Result<Array2<f32>> {
        let (_, c, h, w) = images.dim();

        if c != 3 || (h, w) != self.input_size {
            return Err(GanErr::Classifier(format!(
                "expected 3x{}x{} images, got {c}x{h}x{w}",
                self.input_size.0, self.input_size.1
            )));
        }

        let x = flatten(images)?;
        Ok(self.model.infer_until(&self.params, x.view(), depth)?)
    }
}

impl Classifier for DenseClassifier {
    fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    fn logits(&self, images: ArrayView4<f32>) -> Result<Array2<f32>> {
        self.infer_until(images, self.model.layers().len())
    }
}

impl FeatureExtractor for DenseClassifier {
    fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    fn features(&self, images: ArrayView4<f32>) -> Result<Array2<f32>> {
        self.infer_until(images, self.model.layers().len() - 1)
    }
}
