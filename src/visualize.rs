use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use log::info;
use ndarray::{Array2, ArrayView4, Axis, s};

use crate::Result;

/// Pixels between neighbouring images of a grid.
pub const PADDING: usize = 2;

/// Somewhere to send the generated samples of a training run.
pub trait SampleSink {
    /// Exports a batch of `(N, C, H, W)` images produced by `variant` at `epoch`.
    fn export(&mut self, images: ArrayView4<f32>, variant: &str, epoch: usize) -> Result<()>;
}

impl<T: SampleSink + ?Sized> SampleSink for Box<T> {
    fn export(&mut self, images: ArrayView4<f32>, variant: &str, epoch: usize) -> Result<()> {
        (**self).export(images, variant, epoch)
    }
}

/// Discards every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SampleSink for NullSink {
    fn export(&mut self, _: ArrayView4<f32>, _: &str, _: usize) -> Result<()> {
        Ok(())
    }
}

/// Writes the first images of each batch as a grid in a binary PGM file.
#[derive(Debug, Clone)]
pub struct GridWriter {
    dir: PathBuf,
    max_images: usize,
}

impl GridWriter {
    /// Creates a new `GridWriter`, creating `dir` if needed.
    ///
    /// # Arguments
    /// * `dir` - Where the grids are written.
    /// * `max_images` - The most images a grid holds.
    pub fn new<P: Into<PathBuf>>(dir: P, max_images: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_images })
    }

    /// The file a grid of `variant` at `epoch` is written to.
    pub fn path_for(&self, variant: &str, epoch: usize) -> PathBuf {
        self.dir.join(format!("{variant}-epoch-{epoch:03}.pgm"))
    }
}

impl SampleSink for GridWriter {
    fn export(&mut self, images: ArrayView4<f32>, variant: &str, epoch: usize) -> Result<()> {
        let n = images.len_of(Axis(0)).min(self.max_images);
        let grid = make_grid(images.slice(s![..n, .., .., ..]), PADDING);

        let path = self.path_for(variant, epoch);
        let mut out = BufWriter::new(File::create(&path)?);
        write_pgm(&mut out, &grid)?;
        out.flush()?;

        info!("{variant} samples at epoch {epoch}: {}", path.display());
        Ok(())
    }
}

/// Min-max normalizes the first channel of the images to `[0, 1]` and tiles them in
/// `ceil(sqrt(n))` columns separated by `padding` zeroed pixels.
pub fn make_grid(images: ArrayView4<f32>, padding: usize) -> Array2<f32> {
    let (n, _, h, w) = images.dim();
    if n == 0 {
        return Array2::zeros((0, 0));
    }

    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    let channel = images.index_axis(Axis(1), 0);

    let min = channel.iter().copied().fold(f32::INFINITY, f32::min);
    let max = channel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = (max - min).max(1e-5);

    let mut grid = Array2::zeros((padding + rows * (h + padding), padding + cols * (w + padding)));

    for (i, image) in channel.outer_iter().enumerate() {
        let top = padding + (i / cols) * (h + padding);
        let left = padding + (i % cols) * (w + padding);

        grid.slice_mut(s![top..top + h, left..left + w])
            .zip_mut_with(&image, |px, &v| *px = (v - min) / range);
    }

    grid
}

fn write_pgm<W: Write>(out: &mut W, grid: &Array2<f32>) -> Result<()> {
    let (h, w) = grid.dim();
    write!(out, "P5\n{w} {h}\n255\n")?;

    let bytes: Vec<u8> = grid
        .iter()
        .map(|v| (v.clamp(0., 1.) * 255.).round() as u8)
        .collect();
    out.write_all(&bytes)?;

    Ok(())
}
