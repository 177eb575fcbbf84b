use std::num::NonZeroUsize;

use ndarray::Array4;
use rand::{Rng, seq::SliceRandom};

use super::SampleSource;

/// Yields owned `(N, 1, H, W)` batches of a source, in a fresh random order every epoch.
#[derive(Debug, Clone)]
pub struct DataLoader<S> {
    source: S,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
}

impl<S: SampleSource> DataLoader<S> {
    /// Creates a new `DataLoader`, visiting the source in order until the first `shuffle`.
    pub fn new(source: S, batch_size: NonZeroUsize) -> Self {
        let order = (0..source.len()).collect();

        Self {
            source,
            batch_size: batch_size.get(),
            order,
            cursor: 0,
        }
    }

    /// Returns the amount of batches in one epoch.
    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Starts a new epoch with a new random order.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
        self.cursor = 0;
    }

    /// Returns the next batch of this epoch, or `None` if exhausted.
    ///
    /// Every batch has `batch_size` images except possibly the last one.
    pub fn next_batch(&mut self) -> Option<Array4<f32>> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let (h, w) = self.source.image_shape();
        let pixels = h * w;
        let images = self.source.images();

        let mut batch = Vec::with_capacity((end - self.cursor) * pixels);
        for &i in &self.order[self.cursor..end] {
            batch.extend_from_slice(&images[i * pixels..(i + 1) * pixels]);
        }

        let n = end - self.cursor;
        self.cursor = end;
        Array4::from_shape_vec((n, 1, h, w), batch).ok()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::data::InMemorySource;

    // Five 1x2 images, image i holds [i, i].
    fn loader(batch_size: usize) -> DataLoader<InMemorySource> {
        let pixels = (0..5).flat_map(|i| [i as f32, i as f32]).collect();
        let source = InMemorySource::new(pixels, (1, 2)).unwrap();
        DataLoader::new(source, NonZeroUsize::new(batch_size).unwrap())
    }

    #[test]
    fn batches_are_full_except_the_last() {
        let mut dl = loader(2);

        assert_eq!(dl.num_batches(), 3);

        let sizes: Vec<_> = std::iter::from_fn(|| dl.next_batch())
            .map(|b| b.dim())
            .collect();
        assert_eq!(sizes, [(2, 1, 1, 2), (2, 1, 1, 2), (1, 1, 1, 2)]);
        assert!(dl.next_batch().is_none());
    }

    #[test]
    fn shuffled_epochs_cover_every_image_once() {
        let mut dl = loader(2);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..3 {
            dl.shuffle(&mut rng);

            let mut seen: Vec<usize> = std::iter::from_fn(|| dl.next_batch())
                .flat_map(|b| b.outer_iter().map(|img| img[[0, 0, 0]] as usize).collect::<Vec<_>>())
                .collect();
            seen.sort_unstable();

            assert_eq!(seen, [0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn images_stay_whole() {
        let mut dl = loader(5);
        dl.shuffle(&mut StdRng::seed_from_u64(3));

        let batch = dl.next_batch().unwrap();
        for img in batch.outer_iter() {
            assert_eq!(img[[0, 0, 0]], img[[0, 0, 1]]);
        }
    }
}
