// ============================================================================
// COLOR ADJUSTMENTS — exposure, contrast, saturation
// ============================================================================
//
// Each adjustment is a linear blend between the image and a "degenerate"
// base image:  out = base + factor * (pixel - base).
//   exposure   → base is black
//   contrast   → base is a flat gray at the image's mean luma
//   saturation → base is the pixel's own luma (grayscale copy)
// factor 1.0 reproduces the input exactly. Results are clamped to 0..=255 and
// truncated toward zero. Rows run in parallel via rayon.
// ============================================================================

use image::RgbImage;
use rayon::prelude::*;

// ============================================================================
// HELPERS
// ============================================================================

/// ITU-R 601 luma in 16.16 fixed point, rounded.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

#[inline]
fn blend(base: f32, value: f32, factor: f32) -> u8 {
    let v = base + factor * (value - base);
    if v <= 0.0 {
        0
    } else if v >= 255.0 {
        255
    } else {
        v as u8
    }
}

/// Apply a per-pixel transform into a fresh buffer.
/// `transform` receives `[r, g, b]` and returns the new triple.
fn apply_pixel_transform<F>(img: &RgbImage, transform: F) -> RgbImage
where
    F: Fn([u8; 3]) -> [u8; 3] + Sync,
{
    let w = img.width() as usize;
    let h = img.height() as usize;
    if w == 0 || h == 0 {
        return img.clone();
    }

    let src_raw = img.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for (px_out, px_in) in row_out.chunks_exact_mut(3).zip(row_in.chunks_exact(3)) {
            px_out.copy_from_slice(&transform([px_in[0], px_in[1], px_in[2]]));
        }
    });

    RgbImage::from_raw(img.width(), img.height(), dst_raw)
        .unwrap_or_else(|| img.clone())
}

/// Mean luma over every pixel, rounded half up. Empty images report 0.
pub fn mean_luma(img: &RgbImage) -> u8 {
    let count = img.width() as u64 * img.height() as u64;
    if count == 0 {
        return 0;
    }
    let sum: u64 = img
        .as_raw()
        .par_chunks(3)
        .map(|p| luma(p[0], p[1], p[2]) as u64)
        .sum();
    ((sum as f64 / count as f64) + 0.5).floor().min(255.0) as u8
}

// ============================================================================
// ADJUSTMENTS
// ============================================================================

/// Brightness ("exposure" in the UI). `factor` 0.0 = black, 1.0 = unchanged.
pub fn adjust_exposure(img: &RgbImage, factor: f32) -> RgbImage {
    apply_pixel_transform(img, move |[r, g, b]| {
        [
            blend(0.0, r as f32, factor),
            blend(0.0, g as f32, factor),
            blend(0.0, b as f32, factor),
        ]
    })
}

/// Contrast around the image's mean luma. `factor` 0.0 = flat gray.
pub fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_luma(img) as f32;
    apply_pixel_transform(img, move |[r, g, b]| {
        [
            blend(mean, r as f32, factor),
            blend(mean, g as f32, factor),
            blend(mean, b as f32, factor),
        ]
    })
}

/// Saturation relative to each pixel's luma. `factor` 0.0 = grayscale.
pub fn adjust_saturation(img: &RgbImage, factor: f32) -> RgbImage {
    apply_pixel_transform(img, move |[r, g, b]| {
        let l = luma(r, g, b) as f32;
        [
            blend(l, r as f32, factor),
            blend(l, g as f32, factor),
            blend(l, b as f32, factor),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample() -> RgbImage {
        RgbImage::from_fn(7, 5, |x, y| {
            Rgb([(x * 37 % 256) as u8, (y * 51 % 256) as u8, ((x + y) * 23 % 256) as u8])
        })
    }

    #[test]
    fn factor_one_is_identity() {
        let img = sample();
        assert_eq!(adjust_exposure(&img, 1.0), img);
        assert_eq!(adjust_contrast(&img, 1.0), img);
        assert_eq!(adjust_saturation(&img, 1.0), img);
    }

    #[test]
    fn zero_exposure_is_black() {
        let out = adjust_exposure(&sample(), 0.0);
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn exposure_truncates_and_clamps() {
        let img = RgbImage::from_pixel(1, 1, Rgb([101, 200, 3]));
        let out = adjust_exposure(&img, 1.5);
        // 151.5 → 151, 300 → 255, 4.5 → 4
        assert_eq!(out.get_pixel(0, 0).0, [151, 255, 4]);
    }

    #[test]
    fn zero_contrast_is_flat_mean() {
        let img = sample();
        let mean = mean_luma(&img);
        let out = adjust_contrast(&img, 0.0);
        assert!(out.pixels().all(|p| p.0 == [mean, mean, mean]));
    }

    #[test]
    fn zero_saturation_is_grayscale() {
        let out = adjust_saturation(&sample(), 0.0);
        assert!(out.pixels().all(|p| p[0] == p[1] && p[1] == p[2]));
    }

    #[test]
    fn gray_pixels_ignore_saturation() {
        let img = RgbImage::from_pixel(3, 3, Rgb([90, 90, 90]));
        assert_eq!(adjust_saturation(&img, 2.0), img);
    }

    #[test]
    fn input_is_untouched_and_dimensions_kept() {
        let img = sample();
        let copy = img.clone();
        let out = adjust_contrast(&img, 1.8);
        assert_eq!(img, copy);
        assert_eq!(out.dimensions(), img.dimensions());
    }

    #[test]
    fn luma_weights_sum_to_full_scale() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 0, 0), 76);
    }

    #[test]
    fn luma_rounds_to_nearest() {
        // 123.73 and 140.68 before rounding
        assert_eq!(luma(10, 200, 30), 124);
        assert_eq!(luma(100, 150, 200), 141);
        assert_eq!(luma(200, 100, 50), 124);
    }

    #[test]
    fn mean_luma_rounds_half_up() {
        // lumas 18 and 125, mean 71.5
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([18, 18, 18]) } else { Rgb([125, 125, 125]) });
        assert_eq!(mean_luma(&img), 72);
        assert_eq!(adjust_contrast(&img, 0.0).get_pixel(0, 0).0, [72, 72, 72]);
    }

    #[test]
    fn contrast_blends_around_rounded_mean() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([18, 18, 18]) } else { Rgb([125, 125, 125]) });
        // 72 + 0.5 * (18 - 72) = 45, 72 + 0.5 * (125 - 72) = 98.5
        let soft = adjust_contrast(&img, 0.5);
        assert_eq!(soft.get_pixel(0, 0).0, [45, 45, 45]);
        assert_eq!(soft.get_pixel(1, 0).0, [98, 98, 98]);
        // 7.2 and 135.6
        let punchy = adjust_contrast(&img, 1.2);
        assert_eq!(punchy.get_pixel(0, 0).0, [7, 7, 7]);
        assert_eq!(punchy.get_pixel(1, 0).0, [135, 135, 135]);
        // -36 clamps to 0, 178
        let hard = adjust_contrast(&img, 2.0);
        assert_eq!(hard.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(hard.get_pixel(1, 0).0, [178, 178, 178]);
    }

    #[test]
    fn saturation_boost_matches_hand_values() {
        // luma 141: 141 + 1.4 * (c - 141)
        let img = RgbImage::from_pixel(1, 1, Rgb([100, 150, 200]));
        assert_eq!(adjust_saturation(&img, 1.4).get_pixel(0, 0).0, [83, 153, 223]);
        // luma 124
        let img = RgbImage::from_pixel(1, 1, Rgb([200, 100, 50]));
        assert_eq!(adjust_saturation(&img, 1.4).get_pixel(0, 0).0, [230, 90, 20]);
    }
}
