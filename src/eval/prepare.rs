use ndarray::{Array2, Array4, ArrayView2, ArrayView4, Axis};

/// Turns single channel images into the 3 channel `size` images a classifier expects.
///
/// The first channel is resized bilinearly with half pixel centers and copied to the 3 output
/// channels.
pub fn prepare(images: ArrayView4<f32>, size: (usize, usize)) -> Array4<f32> {
    let n = images.len_of(Axis(0));
    let (h, w) = size;
    let mut out = Array4::zeros((n, 3, h, w));

    for (image, mut prepared) in images.outer_iter().zip(out.outer_iter_mut()) {
        let resized = resize_bilinear(image.index_axis(Axis(0), 0), size);

        for mut channel in prepared.outer_iter_mut() {
            channel.assign(&resized);
        }
    }

    out
}

/// Resizes an image bilinearly, sampling the source at `(dst + 0.5) · scale - 0.5`.
pub fn resize_bilinear(image: ArrayView2<f32>, size: (usize, usize)) -> Array2<f32> {
    let (in_h, in_w) = image.dim();
    let (out_h, out_w) = size;

    if (in_h, in_w) == size {
        return image.to_owned();
    }

    if in_h == 0 || in_w == 0 {
        return Array2::zeros(size);
    }

    let rows: Vec<_> = (0..out_h).map(|y| source_index(y, in_h, out_h)).collect();
    let cols: Vec<_> = (0..out_w).map(|x| source_index(x, in_w, out_w)).collect();

    Array2::from_shape_fn(size, |(y, x)| {
        let (y0, y1, ly) = rows[y];
        let (x0, x1, lx) = cols[x];

        let top = (1. - lx) * image[[y0, x0]] + lx * image[[y0, x1]];
        let bottom = (1. - lx) * image[[y1, x0]] + lx * image[[y1, x1]];
        (1. - ly) * top + ly * bottom
    })
}

/// The two neighbouring source indices of `dst` and the weight of the second one.
fn source_index(dst: usize, in_len: usize, out_len: usize) -> (usize, usize, f32) {
    let scale = in_len as f32 / out_len as f32;
    let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.);

    let i0 = (src as usize).min(in_len - 1);
    let i1 = (i0 + 1).min(in_len - 1);
    (i0, i1, src - i0 as f32)
}
