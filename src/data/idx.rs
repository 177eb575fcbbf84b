use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;

use super::SampleSource;
use crate::{GanErr, Result, config::Split, gan::IMAGE_SIDE};

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// Maps a raw `[0, 255]` pixel to `[-1, 1]`.
pub fn normalize_pixel(px: u8) -> f32 {
    f32::from(px) / 255. * 2. - 1.
}

fn file_names(split: Split) -> (&'static str, &'static str) {
    match split {
        Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
        Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
    }
}

/// An IDX file split into its big endian `u32` header fields and its payload.
struct IdxFile<'a> {
    path: &'a Path,
    bytes: Vec<u8>,
}

impl<'a> IdxFile<'a> {
    fn read(path: &'a Path) -> Result<Self> {
        if !path.is_file() {
            return Err(unavailable(path, "file not found".into()));
        }

        let bytes = fs::read(path).map_err(|e| unavailable(path, e.to_string()))?;
        Ok(Self { path, bytes })
    }

    /// Returns the `i`-th header field.
    fn field(&self, i: usize) -> Result<u32> {
        self.bytes
            .get(i * 4..(i + 1) * 4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_be_bytes)
            .ok_or_else(|| unavailable(self.path, "truncated header".into()))
    }

    fn expect_magic(&self, magic: u32) -> Result<()> {
        let got = self.field(0)?;

        if got != magic {
            return Err(unavailable(
                self.path,
                format!("expected magic number {magic:#010x}, got {got:#010x}"),
            ));
        }

        Ok(())
    }
}

fn unavailable(path: &Path, reason: String) -> GanErr {
    GanErr::DatasetUnavailable {
        path: PathBuf::from(path),
        reason,
    }
}

/// One split of a dataset stored as IDX files in the MNIST layout, of any length.
///
/// The labels file is checked against the images and otherwise dropped.
#[derive(Debug, Clone)]
pub struct IdxSource {
    images: Vec<f32>,
}

impl IdxSource {
    /// Loads the given split of the dataset found in `base_path`.
    ///
    /// # Returns
    /// The source or `DatasetUnavailable` if one of the split's files is missing, malformed or
    /// holds images that are not `28 x 28`.
    pub fn open<P: AsRef<Path>>(base_path: P, split: Split) -> Result<Self> {
        let base_path = base_path.as_ref();
        let (images_name, labels_name) = file_names(split);
        let images_path = base_path.join(images_name);
        let labels_path = base_path.join(labels_name);

        let images = IdxFile::read(&images_path)?;
        images.expect_magic(IMAGES_MAGIC)?;
        let count = images.field(1)? as usize;
        let (rows, cols) = (images.field(2)? as usize, images.field(3)? as usize);

        if (rows, cols) != (IMAGE_SIDE, IMAGE_SIDE) {
            return Err(unavailable(
                &images_path,
                format!("expected {IMAGE_SIDE}x{IMAGE_SIDE} images, got {rows}x{cols}"),
            ));
        }

        let payload = &images.bytes[16..];
        let expected = count * rows * cols;
        if payload.len() != expected {
            return Err(unavailable(
                &images_path,
                format!("expected {expected} pixels, got {}", payload.len()),
            ));
        }

        let labels = IdxFile::read(&labels_path)?;
        labels.expect_magic(LABELS_MAGIC)?;
        let labeled = labels.field(1)? as usize;

        if labeled != count {
            return Err(unavailable(
                &labels_path,
                format!("{labeled} labels for {count} images"),
            ));
        }

        let images: Vec<f32> = payload.iter().copied().map(normalize_pixel).collect();
        info!(
            "loaded {count} images from the {split:?} split of {}",
            base_path.display()
        );

        Ok(Self { images })
    }
}

impl SampleSource for IdxSource {
    fn len(&self) -> usize {
        self.images.len() / (IMAGE_SIDE * IMAGE_SIDE)
    }

    fn image_shape(&self) -> (usize, usize) {
        (IMAGE_SIDE, IMAGE_SIDE)
    }

    fn images(&self) -> &[f32] {
        &self.images
    }
}
