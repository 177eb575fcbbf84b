use ndarray::Array4;

use crate::{GanErr, Result};

/// A fixed collection of real images, normalized to `[-1, 1]`.
pub trait SampleSource {
    /// Returns the amount of images held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The height and width of every image.
    fn image_shape(&self) -> (usize, usize);

    /// Every image's pixels, one image after the other in row major order.
    fn images(&self) -> &[f32];

    /// Copies the first `n` images, or every image if there are fewer, into a `(n, 1, H, W)`
    /// batch.
    fn head(&self, n: usize) -> Array4<f32> {
        let (h, w) = self.image_shape();
        let n = n.min(self.len());
        let images = self.images();

        Array4::from_shape_fn((n, 1, h, w), |(i, _, y, x)| images[(i * h + y) * w + x])
    }
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn image_shape(&self) -> (usize, usize) {
        (**self).image_shape()
    }

    fn images(&self) -> &[f32] {
        (**self).images()
    }
}

/// Single channel images living in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    images: Vec<f32>,
    shape: (usize, usize),
}

impl InMemorySource {
    /// Creates a new `InMemorySource`.
    ///
    /// # Arguments
    /// * `images` - The pixels of every image, already normalized.
    /// * `shape` - The height and width of each image.
    ///
    /// # Returns
    /// The source or an error if `images` doesn't hold a positive amount of whole images.
    pub fn new(images: Vec<f32>, shape: (usize, usize)) -> Result<Self> {
        let pixels = shape.0 * shape.1;

        if pixels == 0 || images.is_empty() || images.len() % pixels != 0 {
            return Err(GanErr::InvalidConfig(format!(
                "{} pixels can't be split into images of {}x{}",
                images.len(),
                shape.0,
                shape.1
            )));
        }

        Ok(Self { images, shape })
    }
}

impl SampleSource for InMemorySource {
    fn len(&self) -> usize {
        self.images.len() / (self.shape.0 * self.shape.1)
    }

    fn image_shape(&self) -> (usize, usize) {
        self.shape
    }

    fn images(&self) -> &[f32] {
        &self.images
    }
}
