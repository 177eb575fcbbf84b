use ndarray::{Array2, ArrayView2, Axis, concatenate};
use rand::Rng;

use super::{Classifier, prepare};
use crate::{GanErr, Result, gan::Generator};

/// The mean and population standard deviation of the per split scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InceptionScore {
    pub mean: f32,
    pub std: f32,
}

/// Row wise softmax.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut probs = logits.to_owned();

    for mut row in probs.outer_iter_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }

    probs
}

/// Computes the Inception Score of class probabilities, one row per sample.
///
/// The rows are split into `splits` contiguous groups of `N / splits` rows. Each group scores
/// `exp(mean KL(p(y|x) ‖ p(y)))` with `p(y)` its mean row.
pub fn inception_score_from_preds(preds: ArrayView2<f32>, splits: usize) -> Result<InceptionScore> {
    check_splits(preds.nrows(), splits)?;

    let size = preds.nrows() / splits;
    let scores: Vec<f64> = (0..splits)
        .map(|k| {
            let part = preds.slice_axis(Axis(0), (k * size..(k + 1) * size).into());
            split_score(part)
        })
        .collect();

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

    Ok(InceptionScore {
        mean: mean as f32,
        std: var.sqrt() as f32,
    })
}

/// Generates `num_samples` images in batches and scores them with `classifier`.
///
/// # Arguments
/// * `generator` - The model being evaluated, left untouched.
/// * `classifier` - A pretrained classifier.
/// * `num_samples` - How many images to score.
/// * `batch_size` - How many images go through the classifier at once.
/// * `splits` - How many groups the predictions are split in.
/// * `rng` - The source of the latents.
pub fn inception_score<C, R>(
    generator: &Generator,
    classifier: &C,
    num_samples: usize,
    batch_size: usize,
    splits: usize,
    rng: &mut R,
) -> Result<InceptionScore>
where
    C: Classifier + ?Sized,
    R: Rng,
{
    check_splits(num_samples, splits)?;

    let batch_size = batch_size.max(1);
    let mut preds = Vec::with_capacity(num_samples.div_ceil(batch_size));
    let mut remaining = num_samples;

    while remaining > 0 {
        let n = remaining.min(batch_size);
        let images = generator.sample(n, rng)?;
        let prepared = prepare(images.view(), classifier.input_size());
        let logits = classifier.logits(prepared.view())?;

        preds.push(softmax(logits.view()));
        remaining -= n;
    }

    let views: Vec<_> = preds.iter().map(|p| p.view()).collect();
    let preds = concatenate(Axis(0), &views)
        .map_err(|e| GanErr::Classifier(format!("inconsistent class counts: {e}")))?;

    inception_score_from_preds(preds.view(), splits)
}

fn check_splits(samples: usize, splits: usize) -> Result<()> {
    if splits == 0 || samples < splits {
        return Err(GanErr::InvalidConfig(format!(
            "can't split {samples} samples in {splits} groups"
        )));
    }

    Ok(())
}

fn split_score(part: ArrayView2<f32>) -> f64 {
    let rows = part.nrows() as f64;
    let py: Vec<f64> = part
        .axis_iter(Axis(1))
        .map(|col| col.iter().map(|&p| f64::from(p)).sum::<f64>() / rows)
        .collect();

    let kl_sum: f64 = part
        .outer_iter()
        .map(|row| {
            row.iter()
                .zip(&py)
                .filter(|&(&p, _)| p > 0.)
                .map(|(&p, &q)| {
                    let p = f64::from(p);
                    p * (p.ln() - q.ln())
                })
                .sum::<f64>()
        })
        .sum();

    (kl_sum / rows).exp()
}
