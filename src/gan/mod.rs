mod discriminator;
mod generator;

pub use discriminator::Discriminator;
pub use generator::Generator;

use machine_learning::MlErr;
use ndarray::{Array2, Array4, ArrayView2, ArrayView4};

use crate::Result;

/// The height and width of every image.
pub const IMAGE_SIDE: usize = 28;

/// The amount of pixels of a flattened image.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

/// Flattens a `(N, C, H, W)` batch into one row per image.
pub fn flatten(images: ArrayView4<f32>) -> Result<Array2<f32>> {
    let (n, c, h, w) = images.dim();

    let flat = images
        .to_shape((n, c * h * w))
        .map_err(|_| MlErr::SizeMismatch {
            what: "flattened images",
            got: images.len(),
            expected: n * c * h * w,
        })?;

    Ok(flat.into_owned())
}

/// Folds rows of `IMAGE_PIXELS` back into a `(N, 1, IMAGE_SIDE, IMAGE_SIDE)` batch.
pub fn unflatten(rows: ArrayView2<f32>) -> Result<Array4<f32>> {
    let n = rows.nrows();

    if rows.ncols() != IMAGE_PIXELS {
        return Err(MlErr::SizeMismatch {
            what: "image pixels",
            got: rows.ncols(),
            expected: IMAGE_PIXELS,
        }
        .into());
    }

    let images = rows
        .to_shape((n, 1, IMAGE_SIDE, IMAGE_SIDE))
        .map_err(|_| MlErr::SizeMismatch {
            what: "image batch",
            got: rows.len(),
            expected: n * IMAGE_PIXELS,
        })?;

    Ok(images.into_owned())
}
