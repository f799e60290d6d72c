// ============================================================================
// RESAMPLING — bounded downscale for preview/export, fit-to-display
// ============================================================================

use image::{DynamicImage, GenericImageView, RgbImage, imageops};

use crate::ops::effects::resize_nearest;

/// Filter for preview and export downscales.
const DOWNSCALE_FILTER: imageops::FilterType = imageops::FilterType::Triangle;

/// Largest size with the same aspect ratio that fits in `max_w × max_h`.
/// Sides are floored and never drop below 1. Returns the input size when it
/// already fits.
pub fn fit_dimensions(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let max_w = max_w.max(1);
    let max_h = max_h.max(1);
    if w <= max_w && h <= max_h {
        return (w, h);
    }
    let (w64, h64, mw, mh) = (w as u64, h as u64, max_w as u64, max_h as u64);
    // Compare max_w / w against max_h / h without floats.
    if mw * h64 <= mh * w64 {
        (max_w, ((h64 * mw) / w64).max(1) as u32)
    } else {
        (((w64 * mh) / h64).max(1) as u32, max_h)
    }
}

/// Shrink so the larger side is at most `max_dimension`, bilinear filtering.
/// Images that already fit come back as an unscaled copy.
pub fn downscale_to_fit(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = fit_dimensions(w, h, max_dimension, max_dimension);
    if (new_w, new_h) == (w, h) {
        return img.clone();
    }
    crate::log_info!(
        "Downscale {}x{} -> {}x{} (max {})",
        w,
        h,
        new_w,
        new_h,
        max_dimension
    );
    img.resize_exact(new_w, new_h, DOWNSCALE_FILTER)
}

/// Shrink a result to fit a display area with nearest-neighbour sampling so
/// pixel blocks stay crisp. Never upscales.
pub fn fit_to_display(img: &RgbImage, area_w: u32, area_h: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = fit_dimensions(w, h, area_w, area_h);
    if (new_w, new_h) == (w, h) {
        return img.clone();
    }
    resize_nearest(img, new_w, new_h)
}

/// Top-left offset that centres an `image` sized box inside `area`.
pub fn centered_offset(area: (u32, u32), image: (u32, u32)) -> (u32, u32) {
    (
        area.0.saturating_sub(image.0) / 2,
        area.1.saturating_sub(image.1) / 2,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn preview_cap_on_landscape_photo() {
        assert_eq!(fit_dimensions(3000, 2000, 1200, 1200), (1200, 800));
        assert_eq!(fit_dimensions(2000, 3000, 1200, 1200), (800, 1200));
    }

    #[test]
    fn small_images_are_not_scaled() {
        assert_eq!(fit_dimensions(640, 480, 1200, 1200), (640, 480));
        let img = DynamicImage::ImageRgb8(RgbImage::new(10, 4));
        let out = downscale_to_fit(&img, 1200);
        assert_eq!(out.dimensions(), (10, 4));
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_dimensions(10_000, 2, 100, 100), (100, 1));
    }

    #[test]
    fn downscale_uses_the_larger_side() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(300, 120));
        let out = downscale_to_fit(&img, 100);
        assert_eq!(out.dimensions(), (100, 40));
    }

    #[test]
    fn display_fit_never_upscales() {
        let img = RgbImage::from_pixel(50, 20, Rgb([1, 2, 3]));
        assert_eq!(fit_to_display(&img, 800, 600).dimensions(), (50, 20));
    }

    #[test]
    fn display_fit_respects_both_sides() {
        let img = RgbImage::new(400, 300);
        assert_eq!(fit_to_display(&img, 200, 600).dimensions(), (200, 150));
        assert_eq!(fit_to_display(&img, 800, 150).dimensions(), (200, 150));
    }

    #[test]
    fn centering() {
        assert_eq!(centered_offset((800, 600), (200, 150)), (300, 225));
        assert_eq!(centered_offset((100, 100), (200, 50)), (0, 25));
    }
}
