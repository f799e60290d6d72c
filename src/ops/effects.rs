// ============================================================================
// PIXELATE — block mosaic via nearest-neighbour down/up sampling
// ============================================================================
//
// The image is sampled down to (w / block, h / block) and straight back up to
// (w, h), both with nearest-neighbour. Sizes that do not divide evenly are not
// special-cased: the sampling formula spreads the remainder over the blocks.
// ============================================================================

use image::RgbImage;
use rayon::prelude::*;

/// Source index for destination index `d` when resampling an axis of length
/// `src` to length `dst`: `floor((d + 0.5) * src / dst)`, in integer math.
#[inline]
pub fn nearest_index(d: u32, src: u32, dst: u32) -> u32 {
    let idx = ((2 * d as u64 + 1) * src as u64) / (2 * dst as u64);
    (idx as u32).min(src.saturating_sub(1))
}

/// Nearest-neighbour resample of an RGB buffer to exactly `new_w × new_h`.
pub fn resize_nearest(img: &RgbImage, new_w: u32, new_h: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || new_w == 0 || new_h == 0 {
        return RgbImage::new(new_w, new_h);
    }
    if (w, h) == (new_w, new_h) {
        return img.clone();
    }

    let src_raw = img.as_raw();
    let src_stride = w as usize * 3;
    let dst_stride = new_w as usize * 3;
    let x_map: Vec<usize> = (0..new_w)
        .map(|x| nearest_index(x, w, new_w) as usize * 3)
        .collect();
    let mut dst_raw = vec![0u8; dst_stride * new_h as usize];

    dst_raw
        .par_chunks_mut(dst_stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let sy = nearest_index(y as u32, h, new_h) as usize;
            let row_in = &src_raw[sy * src_stride..(sy + 1) * src_stride];
            for (px_out, &sx) in row_out.chunks_exact_mut(3).zip(&x_map) {
                px_out.copy_from_slice(&row_in[sx..sx + 3]);
            }
        });

    RgbImage::from_raw(new_w, new_h, dst_raw).unwrap_or_else(|| RgbImage::new(new_w, new_h))
}

/// Dimensions of the intermediate mosaic grid for a given block size.
pub fn mosaic_dimensions(width: u32, height: u32, block_size: u32) -> (u32, u32) {
    let bs = block_size.max(1);
    ((width / bs).max(1), (height / bs).max(1))
}

/// Pixelate with square blocks of `block_size` pixels (0 is treated as 1).
pub fn pixelate(img: &RgbImage, block_size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let (small_w, small_h) = mosaic_dimensions(w, h, block_size);
    let small = resize_nearest(img, small_w, small_h);
    resize_nearest(&small, w, h)
}
