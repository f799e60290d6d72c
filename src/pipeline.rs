// ============================================================================
// PIPELINE — fixed-order composition of the pixel operations
// ============================================================================
//
//   RGB convert → exposure → contrast → saturation → pixelate → quantize
//
// Each stage returns a new buffer; the caller's source is only read.
// ============================================================================

use std::time::Instant;

use image::{DynamicImage, RgbImage};

use crate::config::{COLOR_SHIFT, CONTRAST, EXPOSURE, PIXEL_SIZE, SATURATION};
use crate::error::EditorError;
use crate::ops::{self, Palette};

/// Snapshot of every control value, captured when a run starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Params {
    /// Mosaic block edge in pixels (≥ 1).
    pub pixel_size: u32,
    /// Palette rotation control, 0–100.
    pub color_shift: u32,
    pub exposure: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub palette: Palette,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            pixel_size: PIXEL_SIZE.default,
            color_shift: COLOR_SHIFT.default,
            exposure: EXPOSURE.default,
            contrast: CONTRAST.default,
            saturation: SATURATION.default,
            palette: Palette::default(),
        }
    }
}

impl Params {
    /// Force every value into its control range.
    pub fn clamped(self) -> Self {
        Self {
            pixel_size: PIXEL_SIZE.clamp(self.pixel_size),
            color_shift: COLOR_SHIFT.clamp(self.color_shift),
            exposure: EXPOSURE.clamp(self.exposure),
            contrast: CONTRAST.clamp(self.contrast),
            saturation: SATURATION.clamp(self.saturation),
            palette: self.palette,
        }
    }

    fn validate(&self) -> Result<(), EditorError> {
        for (name, v) in [
            ("exposure", self.exposure),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(EditorError::Processing(format!("invalid {} factor {}", name, v)));
            }
        }
        Ok(())
    }
}

/// Run the full filter chain on `source`.
pub fn process(source: Option<&DynamicImage>, params: &Params) -> Result<RgbImage, EditorError> {
    let source = source.ok_or_else(|| EditorError::Processing("no image loaded".to_string()))?;
    params.validate()?;

    let start = Instant::now();
    let rgb = source.to_rgb8();
    let out = process_rgb(&rgb, params);

    crate::log_info!(
        "Pipeline {}x{} px={} palette={} shift={} in {:.0}ms",
        out.width(),
        out.height(),
        params.pixel_size,
        params.palette,
        params.color_shift,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(out)
}

/// The stage chain on an image that is already RGB. Factors are not checked.
pub fn process_rgb(rgb: &RgbImage, params: &Params) -> RgbImage {
    let img = ops::adjust_exposure(rgb, params.exposure);
    let img = ops::adjust_contrast(&img, params.contrast);
    let img = ops::adjust_saturation(&img, params.saturation);
    let img = ops::pixelate(&img, params.pixel_size);
    ops::quantize(&img, params.palette, params.color_shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn photo(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, ((x ^ y) & 0xff) as u8])
        }))
    }

    #[test]
    fn missing_source_is_a_processing_error() {
        let err = process(None, &Params::default()).unwrap_err();
        assert!(matches!(err, EditorError::Processing(_)));
    }

    #[test]
    fn invalid_factor_is_rejected() {
        let params = Params { contrast: f32::INFINITY, ..Params::default() };
        assert!(process(Some(&photo(4, 4)), &params).is_err());
        let params = Params { saturation: -1.0, ..Params::default() };
        assert!(process(Some(&photo(4, 4)), &params).is_err());
    }

    #[test]
    fn matches_manual_composition() {
        let src = photo(64, 40);
        let params = Params { pixel_size: 6, palette: Palette::Vaporwave, color_shift: 80, ..Params::default() };
        let expected = {
            let rgb = src.to_rgb8();
            let a = ops::adjust_exposure(&rgb, params.exposure);
            let b = ops::adjust_contrast(&a, params.contrast);
            let c = ops::adjust_saturation(&b, params.saturation);
            let d = ops::pixelate(&c, params.pixel_size);
            ops::quantize(&d, params.palette, params.color_shift)
        };
        assert_eq!(process(Some(&src), &params).unwrap(), expected);
    }

    #[test]
    fn rgba_sources_are_flattened_to_rgb() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(9, 9, Rgba([250, 250, 250, 10])));
        let params = Params { palette: Palette::Mono, ..Params::default() };
        let out = process(Some(&src), &params).unwrap();
        assert_eq!(out.dimensions(), (9, 9));
        assert!(out.pixels().all(|p| Palette::Mono.colors().contains(&p.0)));
    }

    #[test]
    fn source_is_not_mutated() {
        let src = photo(20, 20);
        let before = src.to_rgb8();
        let _ = process(Some(&src), &Params::default()).unwrap();
        assert_eq!(src.to_rgb8(), before);
    }

    #[test]
    fn clamped_pulls_values_into_range() {
        let p = Params { pixel_size: 0, color_shift: 400, exposure: 3.0, contrast: 0.0, saturation: -2.0, palette: Palette::Neon }
            .clamped();
        assert_eq!(p.pixel_size, 2);
        assert_eq!(p.color_shift, 100);
        assert_eq!(p.exposure, 1.5);
        assert_eq!(p.contrast, 0.5);
        assert_eq!(p.saturation, 0.0);
    }
}
